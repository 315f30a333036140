use zap_physics::*;

const DT: Real = 1.0 / 60.0;

fn space_with_gravity(gravity: Vect) -> Space {
    Space::with_config(SpaceConfig::default().with_gravity(gravity)).unwrap()
}

fn add_ball(space: &mut Space, position: Vect, velocity: Vect, radius: Real) -> (BodyHandle, ShapeHandle) {
    let body = space
        .add_body(Body::dynamic().with_position(position).with_velocity(velocity))
        .unwrap();
    let shape = space
        .add_shape(body, Shape::circle(radius, Vect::ZERO).unwrap().with_mass(1.0).unwrap())
        .unwrap();
    (body, shape)
}

fn add_ground(space: &mut Space) -> ShapeHandle {
    let ground = Shape::segment(Vect::new(-20.0, 0.0), Vect::new(20.0, 0.0), 0.0)
        .unwrap()
        .with_friction(1.0)
        .unwrap();
    space.add_shape(space.static_body(), ground).unwrap()
}

fn total_kinetic_energy(space: &Space) -> Real {
    space.bodies().map(|(_, b)| b.kinetic_energy()).sum()
}

#[test]
fn free_bodies_keep_their_velocity() {
    let mut space = Space::new();
    let (a, _) = add_ball(&mut space, Vect::new(-5.0, 0.0), Vect::new(1.5, -0.5), 0.5);
    let (b, _) = add_ball(&mut space, Vect::new(5.0, 5.0), Vect::new(0.0, 2.0), 0.5);
    space.body_mut(b).unwrap().set_angular_velocity(0.75);

    for _ in 0..30 {
        space.step(DT).unwrap();
    }
    assert_eq!(space.body(a).unwrap().velocity(), Vect::new(1.5, -0.5));
    assert_eq!(space.body(b).unwrap().velocity(), Vect::new(0.0, 2.0));
    assert_eq!(space.body(b).unwrap().angular_velocity(), 0.75);

    let p = space.body(a).unwrap().position();
    assert!((p - Vect::new(-5.0 + 1.5 * 0.5, -0.25)).length() < 1e-9, "p = {:?}", p);
}

#[test]
fn elastic_collision_conserves_energy() {
    let mut space = Space::new();
    let make = |space: &mut Space, x: Real, vx: Real| {
        let body = space
            .add_body(Body::dynamic().with_position(Vect::new(x, 0.0)).with_velocity(Vect::new(vx, 0.0)))
            .unwrap();
        let shape = Shape::circle(1.0, Vect::ZERO)
            .unwrap()
            .with_mass(1.0)
            .unwrap()
            .with_elasticity(1.0)
            .unwrap()
            .with_friction(0.0)
            .unwrap();
        space.add_shape(body, shape).unwrap();
        body
    };
    let a = make(&mut space, -3.05, 5.0);
    let b = make(&mut space, 3.0, -5.0);

    let before = total_kinetic_energy(&space);
    let mut events: Vec<CollisionEvent> = Vec::new();
    for _ in 0..90 {
        space.step_with(DT, &mut events).unwrap();
    }
    let after = total_kinetic_energy(&space);

    assert!(events.iter().any(|e| e.started), "the balls never touched");
    assert!((after - before).abs() < 1e-3 * before, "energy {} -> {}", before, after);
    assert!(space.body(a).unwrap().velocity().x < 0.0);
    assert!(space.body(b).unwrap().velocity().x > 0.0);
}

#[test]
fn resting_body_falls_asleep_and_stays_put() {
    let config = SpaceConfig::default()
        .with_gravity(Vect::new(0.0, -10.0))
        .with_sleep_time_threshold(0.5);
    let mut space = Space::with_config(config).unwrap();
    add_ground(&mut space);
    let body = space.add_body(Body::dynamic().with_position(Vect::new(0.0, 0.6))).unwrap();
    space
        .add_shape(body, Shape::box_shape(1.0, 1.0, 0.0).unwrap().with_mass(1.0).unwrap().with_friction(0.8).unwrap())
        .unwrap();

    let mut slept_at = None;
    for i in 0..600 {
        space.step(DT).unwrap();
        if space.body(body).unwrap().is_sleeping() {
            slept_at = Some(i);
            break;
        }
    }
    let slept_at = slept_at.expect("body never fell asleep");
    assert!((slept_at + 1) as Real * DT >= 0.5 - 1e-9, "slept after only {} steps", slept_at + 1);

    let resting = space.body(body).unwrap().position();
    for _ in 0..120 {
        space.step(DT).unwrap();
    }
    let b = space.body(body).unwrap();
    assert!(b.is_sleeping());
    assert_eq!(b.position(), resting);
    assert_eq!(b.velocity(), Vect::ZERO);

    space.activate_body(body).unwrap();
    assert!(!space.body(body).unwrap().is_sleeping());
}

#[test]
fn impact_wakes_sleeping_body() {
    let config = SpaceConfig::default()
        .with_gravity(Vect::new(0.0, -10.0))
        .with_sleep_time_threshold(0.5);
    let mut space = Space::with_config(config).unwrap();
    add_ground(&mut space);
    let (resting, _) = add_ball(&mut space, Vect::new(0.0, 0.95), Vect::ZERO, 1.0);
    for _ in 0..300 {
        space.step(DT).unwrap();
    }
    assert!(space.body(resting).unwrap().is_sleeping());

    add_ball(&mut space, Vect::new(0.0, 5.0), Vect::ZERO, 0.5);
    let mut woke = false;
    for _ in 0..120 {
        space.step(DT).unwrap();
        woke |= !space.body(resting).unwrap().is_sleeping();
    }
    assert!(woke, "falling ball did not wake the sleeper");
}

#[test]
fn disjoint_filters_never_make_arbiters() {
    let mut space = Space::new();
    let a = space.add_body(Body::dynamic()).unwrap();
    let b = space.add_body(Body::dynamic().with_position(Vect::new(0.5, 0.0))).unwrap();
    let sa = space
        .add_shape(a, Shape::circle(1.0, Vect::ZERO).unwrap().with_filter(ShapeFilter::new(0, 0b01, 0b01)))
        .unwrap();
    let sb = space
        .add_shape(b, Shape::circle(1.0, Vect::ZERO).unwrap().with_filter(ShapeFilter::new(0, 0b10, 0b10)))
        .unwrap();

    for _ in 0..20 {
        space.step(DT).unwrap();
    }
    assert!(space.arbiter(sa, sb).is_none());
    assert_eq!(space.arbiters().count(), 0);
    assert!(!space.shapes_collide(sa, sb).unwrap().is_empty(), "shapes do overlap");
}

#[test]
fn shared_group_never_collides() {
    let mut space = Space::new();
    let a = space.add_body(Body::dynamic()).unwrap();
    let b = space.add_body(Body::dynamic().with_position(Vect::new(0.5, 0.0))).unwrap();
    let filter = ShapeFilter::new(7, u32::MAX, u32::MAX);
    space.add_shape(a, Shape::circle(1.0, Vect::ZERO).unwrap().with_filter(filter)).unwrap();
    space.add_shape(b, Shape::circle(1.0, Vect::ZERO).unwrap().with_filter(filter)).unwrap();
    space.step(DT).unwrap();
    assert_eq!(space.arbiters().count(), 0);
}

#[test]
fn pin_joint_holds_distance() {
    let mut space = space_with_gravity(Vect::new(0.0, -10.0));
    let anchor = space.static_body();
    let (bob, _) = add_ball(&mut space, Vect::new(3.0, 0.0), Vect::ZERO, 0.25);
    let pin = space
        .add_constraint(Constraint::new(anchor, bob, PinJoint::new(Vect::ZERO, Vect::ZERO)).unwrap())
        .unwrap();
    let d = space.constraint(pin).unwrap().as_pin_joint().unwrap().dist();
    assert!((d - 3.0).abs() < 1e-9);

    let mut worst: Real = 0.0;
    let mut lowest: Real = 0.0;
    for _ in 0..300 {
        space.step(DT).unwrap();
        let p = space.body(bob).unwrap().position();
        worst = worst.max((p.length() - d).abs());
        lowest = lowest.min(p.y);
    }
    assert!(worst < 0.05, "pin drifted by {}", worst);
    assert!(lowest < -2.5, "pendulum never swung, lowest y = {}", lowest);
}

#[test]
fn motor_spins_wheel() {
    let mut space = Space::new();
    let anchor = space.static_body();
    let (wheel, _) = add_ball(&mut space, Vect::new(2.0, 2.0), Vect::ZERO, 1.0);
    space
        .add_constraint(Constraint::new(anchor, wheel, PivotJoint::new(Vect::new(2.0, 2.0), Vect::ZERO)).unwrap())
        .unwrap();
    space
        .add_constraint(Constraint::new(anchor, wheel, SimpleMotor::new(3.0)).unwrap())
        .unwrap();
    for _ in 0..10 {
        space.step(DT).unwrap();
    }
    let body = space.body(wheel).unwrap();
    assert!((body.angular_velocity().abs() - 3.0).abs() < 1e-6, "w = {}", body.angular_velocity());
    assert!((body.position() - Vect::new(2.0, 2.0)).length() < 1e-6);
}

#[test]
fn remove_body_needs_detached_shapes() {
    let mut space = Space::new();
    let (body, shape) = add_ball(&mut space, Vect::ZERO, Vect::ZERO, 1.0);

    assert!(matches!(space.remove_body(body), Err(PhysicsError::IllegalState(_))));
    assert!(space.contains_body(body));

    let shape_value = space.remove_shape(shape).unwrap();
    assert_eq!(shape_value.body(), None);
    space.remove_body(body).unwrap();
    assert!(!space.contains_body(body));

    assert!(matches!(space.remove_body(body), Err(PhysicsError::InvalidHandle(_))));
    assert!(matches!(space.remove_shape(shape), Err(PhysicsError::InvalidHandle(_))));
}

#[test]
fn point_query_against_circle() {
    let r = 2.0;
    let mut space = Space::new();
    let circle = space
        .add_shape(space.static_body(), Shape::circle(r, Vect::ZERO).unwrap())
        .unwrap();

    let inside = space.point_query(Vect::new(r / 2.0, 0.0), 0.0, ShapeFilter::ALL);
    assert_eq!(inside.len(), 1);
    assert_eq!(inside[0].shape, Some(circle));
    assert!((inside[0].distance + r / 2.0).abs() < 1e-9, "d = {}", inside[0].distance);

    let outside = space
        .point_query_nearest(Vect::new(0.0, 2.0 * r), 10.0, ShapeFilter::ALL)
        .unwrap();
    assert!((outside.distance - r).abs() < 1e-9, "d = {}", outside.distance);
    assert!((outside.point - Vect::new(0.0, r)).length() < 1e-9);
    assert!(space.point_query(Vect::new(0.0, 2.0 * r), 0.0, ShapeFilter::ALL).is_empty());
}

#[test]
fn begin_can_ignore_a_pair() {
    struct Ghost;
    impl CollisionHandler for Ghost {
        fn begin(&mut self, _arbiter: &mut Arbiter) -> bool {
            false
        }
    }

    let mut space = space_with_gravity(Vect::new(0.0, -10.0));
    add_ground(&mut space);
    let (ball, _) = add_ball(&mut space, Vect::new(0.0, 1.2), Vect::ZERO, 1.0);
    for _ in 0..60 {
        space.step_with(DT, &mut Ghost).unwrap();
    }
    assert!(space.body(ball).unwrap().position().y < -1.0, "ignored pair still collided");
}

#[test]
fn config_round_trips_through_json() {
    let config = SpaceConfig::default()
        .with_gravity(Vect::new(0.0, -9.8))
        .with_iterations(15);
    let json = config.to_json().unwrap();
    let parsed = SpaceConfig::from_json(&json).unwrap();
    assert_eq!(parsed.iterations, 15);
    assert_eq!(parsed.gravity, Vect::new(0.0, -9.8));
    assert!(Space::with_config(parsed).is_ok());
    assert!(matches!(SpaceConfig::from_json("{ not json"), Err(PhysicsError::Config(_))));
}

#[test]
fn body_from_another_space_is_rejected() {
    let mut home = Space::new();
    let mut away = Space::new();
    let (visitor, _) = add_ball(&mut home, Vect::ZERO, Vect::ZERO, 1.0);
    let (local, _) = add_ball(&mut away, Vect::new(4.0, 0.0), Vect::ZERO, 1.0);

    assert!(matches!(away.body(visitor), Err(PhysicsError::InvalidHandle(_))));
    let joint = Constraint::new(visitor, local, PinJoint::new(Vect::ZERO, Vect::ZERO)).unwrap();
    assert!(matches!(away.add_constraint(joint), Err(PhysicsError::InvalidHandle(_))));
    assert!(matches!(away.remove_body(visitor), Err(PhysicsError::InvalidHandle(_))));

    assert_eq!(away.constraint_count(), 0);
    assert!(home.contains_body(visitor));
    assert!(away.contains_body(local));
}
