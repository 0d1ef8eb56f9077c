//! Avatar selection.
//!
//! Authoring mode takes the head of the explicit selection set. Live mode
//! scans a cyclic queue of avatars for at most one full rotation, filtering
//! per candidate instead of removing entries; only stale handles are dropped.

use std::collections::HashMap;
use std::collections::VecDeque;

use bevy::prelude::*;

use crate::config::PovSex;
use crate::scene::{AvatarSex, HostMode, InteractionMode, SceneChanged, SelectionSet};

/// The attributes the selector reads from a live avatar.
#[derive(Debug, Clone, Copy)]
pub struct AvatarInfo {
  pub sex: AvatarSex,
  pub active: bool,
}

/// Per-pick filter context.
#[derive(Debug, Clone, Copy)]
pub struct FilterCtx {
  pub interaction: InteractionMode,
  pub pov_sex: PovSex,
}

/// Cyclic working set of candidate avatars, live mode only. Every dequeue is
/// followed by a re-enqueue, so a full scan preserves length and relative
/// order; stale handles are the one exception and are dropped for good.
#[derive(Resource, Default)]
pub struct AvatarQueue {
  entries: VecDeque<Entity>,
}

impl AvatarQueue {
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  /// Replaces the working set with the current live avatar set.
  pub fn rebuild(&mut self, avatars: impl IntoIterator<Item = Entity>) {
    self.entries.clear();
    self.entries.extend(avatars);
  }

  pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
    self.entries.iter().copied()
  }

  fn pop_front(&mut self) -> Option<Entity> {
    self.entries.pop_front()
  }

  fn push_back(&mut self, entity: Entity) {
    self.entries.push_back(entity);
  }
}

/// Picks the POV subject for the current mode, or `None` when nothing
/// qualifies. A live-mode miss leaves the queue rotated but intact; the
/// caller may rebuild it from the live set and retry once.
pub fn pick(
  mode: HostMode,
  selection: &SelectionSet,
  queue: &mut AvatarQueue,
  ctx: FilterCtx,
  live: &[(Entity, AvatarInfo)],
) -> Option<Entity> {
  match mode {
    HostMode::Authoring => selection
      .0
      .iter()
      .copied()
      .find(|entity| live.iter().any(|(e, _)| e == entity)),
    HostMode::Live => {
      if queue.is_empty() {
        queue.rebuild(live.iter().map(|(e, _)| *e));
      }
      scan(queue, ctx, live)
    }
  }
}

fn scan(queue: &mut AvatarQueue, ctx: FilterCtx, live: &[(Entity, AvatarInfo)]) -> Option<Entity> {
  let infos: HashMap<Entity, AvatarInfo> = live.iter().copied().collect();

  for _ in 0..queue.len() {
    let Some(candidate) = queue.pop_front() else {
      break;
    };
    let Some(info) = infos.get(&candidate) else {
      // Stale handle: the only case where an entry leaves the queue.
      continue;
    };
    queue.push_back(candidate);

    if ctx.interaction.restricts_non_preferred()
      && ctx.pov_sex != PovSex::Either
      && info.sex == AvatarSex::Male
    {
      continue;
    }
    if let Some(wanted) = ctx.pov_sex.wanted_sex()
      && info.sex != wanted
    {
      continue;
    }
    if !info.active {
      continue;
    }
    return Some(candidate);
  }
  None
}

/// Drops the queue whenever the host signals a scene change; it is rebuilt
/// lazily from the live avatar set on the next pick.
pub fn clear_queue_on_scene_change(
  mut messages: MessageReader<SceneChanged>,
  mut queue: ResMut<AvatarQueue>,
) {
  if !messages.is_empty() {
    messages.clear();
    queue.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn avatar(world: &mut World, sex: AvatarSex, active: bool) -> (Entity, AvatarInfo) {
    (world.spawn_empty().id(), AvatarInfo { sex, active })
  }

  fn default_ctx() -> FilterCtx {
    FilterCtx {
      interaction: InteractionMode::Default,
      pov_sex: PovSex::Either,
    }
  }

  #[test]
  fn live_pick_skips_filtered_and_inactive() {
    let mut world = World::new();
    // #1 fails the sex filter, #2 is inactive, #3 survives.
    let live = vec![
      avatar(&mut world, AvatarSex::Female, true),
      avatar(&mut world, AvatarSex::Male, false),
      avatar(&mut world, AvatarSex::Male, true),
    ];
    let mut queue = AvatarQueue::default();
    queue.rebuild(live.iter().map(|(e, _)| *e));
    let ctx = FilterCtx {
      interaction: InteractionMode::Default,
      pov_sex: PovSex::Male,
    };

    let picked = pick(HostMode::Live, &SelectionSet::default(), &mut queue, ctx, &live);
    assert_eq!(picked, Some(live[2].0));

    // All three still present, rotated so the scan resumes after #3.
    assert_eq!(queue.len(), 3);
    let order: Vec<Entity> = queue.iter().collect();
    assert_eq!(order, vec![live[0].0, live[1].0, live[2].0]);
  }

  #[test]
  fn full_rotation_without_match_preserves_queue() {
    let mut world = World::new();
    let live = vec![
      avatar(&mut world, AvatarSex::Male, false),
      avatar(&mut world, AvatarSex::Male, false),
      avatar(&mut world, AvatarSex::Male, false),
    ];
    let mut queue = AvatarQueue::default();
    queue.rebuild(live.iter().map(|(e, _)| *e));

    let picked = pick(
      HostMode::Live,
      &SelectionSet::default(),
      &mut queue,
      default_ctx(),
      &live,
    );
    assert_eq!(picked, None);
    assert_eq!(queue.len(), 3);
    let order: Vec<Entity> = queue.iter().collect();
    assert_eq!(order, vec![live[0].0, live[1].0, live[2].0]);
  }

  #[test]
  fn stale_handle_is_dropped_not_reenqueued() {
    let mut world = World::new();
    let live = vec![
      avatar(&mut world, AvatarSex::Female, true),
      avatar(&mut world, AvatarSex::Female, true),
    ];
    let stale = world.spawn_empty().id();
    let mut queue = AvatarQueue::default();
    // Queue still holds a despawned avatar between the two live ones.
    queue.rebuild([live[0].0, stale, live[1].0]);

    let ctx = FilterCtx {
      interaction: InteractionMode::Default,
      pov_sex: PovSex::Female,
    };
    let picked = pick(HostMode::Live, &SelectionSet::default(), &mut queue, ctx, &live);
    assert_eq!(picked, Some(live[0].0));

    // Scan stopped at #1; the stale entry is still queued until visited.
    let mut second = AvatarQueue::default();
    second.rebuild([stale, live[0].0, live[1].0]);
    let picked = pick(HostMode::Live, &SelectionSet::default(), &mut second, ctx, &live);
    assert_eq!(picked, Some(live[0].0));
    assert_eq!(second.len(), 2, "stale handle must be dropped");
  }

  #[test]
  fn restrictive_mode_skips_male_unless_either() {
    let mut world = World::new();
    let live = vec![
      avatar(&mut world, AvatarSex::Male, true),
      avatar(&mut world, AvatarSex::Female, true),
    ];
    let mut queue = AvatarQueue::default();
    queue.rebuild(live.iter().map(|(e, _)| *e));

    let ctx = FilterCtx {
      interaction: InteractionMode::Solo,
      pov_sex: PovSex::Male,
    };
    // Male preference, but the restrictive mode skips males; female fails the
    // explicit preference. Nothing qualifies.
    let picked = pick(HostMode::Live, &SelectionSet::default(), &mut queue, ctx, &live);
    assert_eq!(picked, None);

    // With "either", the restrictive skip is waived.
    let ctx = FilterCtx {
      interaction: InteractionMode::Solo,
      pov_sex: PovSex::Either,
    };
    let picked = pick(HostMode::Live, &SelectionSet::default(), &mut queue, ctx, &live);
    assert_eq!(picked, Some(live[0].0));
  }

  #[test]
  fn authoring_pick_uses_selection_head() {
    let mut world = World::new();
    let live = vec![
      avatar(&mut world, AvatarSex::Female, true),
      avatar(&mut world, AvatarSex::Male, true),
    ];
    let mut queue = AvatarQueue::default();

    let selection = SelectionSet(vec![live[1].0, live[0].0]);
    let picked = pick(
      HostMode::Authoring,
      &selection,
      &mut queue,
      default_ctx(),
      &live,
    );
    assert_eq!(picked, Some(live[1].0));

    // Empty selection is a notice, not a failure.
    let picked = pick(
      HostMode::Authoring,
      &SelectionSet::default(),
      &mut queue,
      default_ctx(),
      &live,
    );
    assert_eq!(picked, None);
  }

  #[test]
  fn empty_live_set_rebuild_yields_nothing() {
    let mut queue = AvatarQueue::default();
    let picked = pick(
      HostMode::Live,
      &SelectionSet::default(),
      &mut queue,
      default_ctx(),
      &[],
    );
    assert_eq!(picked, None);
    assert!(queue.is_empty());
  }
}
