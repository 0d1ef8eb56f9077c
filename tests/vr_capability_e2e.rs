//! E2E tests for the dynamic VR binding: capability negotiation at startup,
//! VR-owned viewpoint and FOV, head hiding through the companion
//! integration, and the live-mode bypass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use bevy_avatar_pov::{
  Avatar, AvatarId, AvatarPovPlugin, AvatarRig, AvatarSex, HeadHider, HostMode, PositionMover,
  Pov, PovCamera, PovRequest, SelectionSet, VrCapability, VrProvider, VrProviderRegistry,
};

#[derive(Default)]
struct Recorder {
  moves: Mutex<Vec<(Vec3, bool)>>,
  hides: Mutex<Vec<(Entity, bool)>>,
}

struct TestVr {
  active: Arc<AtomicBool>,
  recorder: Arc<Recorder>,
  with_head_hider: bool,
}

impl VrProvider for TestVr {
  fn name(&self) -> &str {
    "test-vr"
  }

  fn runtime_active(&self) -> bool {
    self.active.load(Ordering::SeqCst)
  }

  fn position_mover(&self) -> Option<PositionMover> {
    let recorder = Arc::clone(&self.recorder);
    Some(Arc::new(move |position, ignore_height| {
      recorder.moves.lock().unwrap().push((position, ignore_height));
    }))
  }

  fn head_hider(&self) -> Option<HeadHider> {
    if !self.with_head_hider {
      return None;
    }
    let recorder = Arc::clone(&self.recorder);
    Some(Arc::new(move |avatar, hidden| {
      recorder.hides.lock().unwrap().push((avatar, hidden));
    }))
  }
}

fn setup_app(provider: TestVr) -> App {
  let mut app = App::new();
  app.add_plugins(MinimalPlugins).add_plugins(AvatarPovPlugin);
  app.world_mut().resource_mut::<VrProviderRegistry>().provider = Some(Box::new(provider));
  app
}

fn spawn_avatar(app: &mut App) -> Entity {
  let world = app.world_mut();
  let head = world
    .spawn((
      Transform::default(),
      GlobalTransform::from(Transform::from_xyz(0.0, 1.6, 0.0)),
    ))
    .id();
  let necks = [
    world
      .spawn((Transform::default(), GlobalTransform::default()))
      .id(),
    world
      .spawn((Transform::default(), GlobalTransform::default()))
      .id(),
  ];
  let eyes = [
    world
      .spawn((
        Transform::default(),
        GlobalTransform::from(Transform::from_xyz(-0.03, 1.65, 0.05)),
      ))
      .id(),
    world
      .spawn((
        Transform::default(),
        GlobalTransform::from(Transform::from_xyz(0.03, 1.65, 0.05)),
      ))
      .id(),
  ];
  world
    .spawn((
      Avatar {
        sex: AvatarSex::Male,
        active: true,
        head_always_visible: true,
      },
      AvatarRig { head, necks, eyes },
      AvatarId(1),
    ))
    .id()
}

fn spawn_camera(app: &mut App, fov: f32) -> Entity {
  app
    .world_mut()
    .spawn((
      PovCamera,
      Transform::from_xyz(5.0, 5.0, 5.0),
      Projection::Perspective(PerspectiveProjection {
        fov,
        ..Default::default()
      }),
    ))
    .id()
}

fn request(app: &mut App, request: PovRequest) {
  app
    .world_mut()
    .resource_mut::<Messages<PovRequest>>()
    .write(request);
}

fn camera_fov(app: &App, camera: Entity) -> f32 {
  match app.world().get::<Projection>(camera).unwrap() {
    Projection::Perspective(perspective) => perspective.fov,
    other => panic!("expected perspective projection, got {other:?}"),
  }
}

#[test]
fn vr_owns_viewpoint_and_fov_in_authoring() {
  let recorder = Arc::new(Recorder::default());
  let mut app = setup_app(TestVr {
    active: Arc::new(AtomicBool::new(true)),
    recorder: Arc::clone(&recorder),
    with_head_hider: false,
  });
  let avatar = spawn_avatar(&mut app);
  let camera = spawn_camera(&mut app, 1.2);
  app.insert_resource(HostMode::Authoring);
  app.insert_resource(SelectionSet(vec![avatar]));
  app.update();

  assert!(app.world().resource::<VrCapability>().usable());

  request(&mut app, PovRequest::Enable);
  app.update();

  let pov = app.world().resource::<Pov>();
  assert!(pov.enabled);
  assert_eq!(pov.current_fov, None, "the VR runtime owns the FOV");
  // Camera untouched: no backup taken, no FOV written, no transform driven.
  assert!((camera_fov(&app, camera) - 1.2).abs() < 1e-5);
  let transform = app.world().get::<Transform>(camera).unwrap();
  assert!(transform.translation.distance(Vec3::new(5.0, 5.0, 5.0)) < 1e-5);

  // The viewpoint mover got the eye midpoint (vr_view_offset is zero).
  let moves = recorder.moves.lock().unwrap();
  assert!(!moves.is_empty());
  let (position, ignore_height) = moves[moves.len() - 1];
  assert!(position.distance(Vec3::new(0.0, 1.65, 0.05)) < 1e-5);
  assert!(!ignore_height);
}

#[test]
fn head_hiding_goes_through_the_vr_integration() {
  let recorder = Arc::new(Recorder::default());
  let mut app = setup_app(TestVr {
    active: Arc::new(AtomicBool::new(true)),
    recorder: Arc::clone(&recorder),
    with_head_hider: true,
  });
  let avatar = spawn_avatar(&mut app);
  spawn_camera(&mut app, 1.2);
  app.insert_resource(HostMode::Authoring);
  app.insert_resource(SelectionSet(vec![avatar]));
  app.update();

  request(&mut app, PovRequest::Enable);
  app.update();

  assert_eq!(*recorder.hides.lock().unwrap(), vec![(avatar, true)]);
  // The desktop visibility flag stays untouched.
  assert!(app.world().get::<Avatar>(avatar).unwrap().head_always_visible);

  request(&mut app, PovRequest::Disable);
  app.update();
  assert_eq!(
    *recorder.hides.lock().unwrap(),
    vec![(avatar, true), (avatar, false)]
  );
}

#[test]
fn inactive_runtime_falls_back_to_desktop() {
  let recorder = Arc::new(Recorder::default());
  let mut app = setup_app(TestVr {
    active: Arc::new(AtomicBool::new(false)),
    recorder: Arc::clone(&recorder),
    with_head_hider: false,
  });
  spawn_avatar(&mut app);
  let camera = spawn_camera(&mut app, 1.2);
  app.update();

  assert!(!app.world().resource::<VrCapability>().usable());

  request(&mut app, PovRequest::Enable);
  app.update();

  // Desktop path: the camera is driven and the FOV applied.
  assert!(app.world().resource::<Pov>().enabled);
  assert!((camera_fov(&app, camera) - 45.0_f32.to_radians()).abs() < 1e-5);
  assert!(recorder.moves.lock().unwrap().is_empty());
}

#[test]
fn live_mode_with_vr_bypasses_the_override() {
  let recorder = Arc::new(Recorder::default());
  let mut app = setup_app(TestVr {
    active: Arc::new(AtomicBool::new(true)),
    recorder: Arc::clone(&recorder),
    with_head_hider: false,
  });
  spawn_avatar(&mut app);
  let camera = spawn_camera(&mut app, 1.2);
  app.update();

  request(&mut app, PovRequest::Enable);
  app.update();

  // Enabled, but the per-frame override stands down entirely.
  assert!(app.world().resource::<Pov>().enabled);
  assert!(recorder.moves.lock().unwrap().is_empty());
  assert!((camera_fov(&app, camera) - 1.2).abs() < 1e-5);
  let transform = app.world().get::<Transform>(camera).unwrap();
  assert!(transform.translation.distance(Vec3::new(5.0, 5.0, 5.0)) < 1e-5);
}

#[test]
fn runtime_going_active_mid_session_is_honored() {
  let active = Arc::new(AtomicBool::new(false));
  let recorder = Arc::new(Recorder::default());
  let mut app = setup_app(TestVr {
    active: Arc::clone(&active),
    recorder: Arc::clone(&recorder),
    with_head_hider: false,
  });
  let avatar = spawn_avatar(&mut app);
  spawn_camera(&mut app, 1.2);
  app.insert_resource(HostMode::Authoring);
  app.insert_resource(SelectionSet(vec![avatar]));
  app.update();

  request(&mut app, PovRequest::Enable);
  app.update();
  assert!(recorder.moves.lock().unwrap().is_empty());

  // The HMD session starts while POV is already enabled; the bound mover
  // takes over on the next frame without re-binding.
  active.store(true, Ordering::SeqCst);
  app.update();
  assert!(!recorder.moves.lock().unwrap().is_empty());
  assert_eq!(app.world().resource::<Pov>().current_fov, None);
}
