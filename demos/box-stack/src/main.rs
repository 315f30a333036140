//! Drops a stack of boxes between a pendulum and a motor-driven wheel and logs what
//! happens. Run with `RUST_LOG=debug` to see sleep and wake events.
//!
//! An optional first argument names a JSON file with a `SpaceConfig`.

use log::info;
use zap_physics::*;

const GROUND_HALF_W: Real = 20.0;
const BOX_SIZE: Real = 1.0;
const STACK_ROWS: usize = 8;
const BALL_RADIUS: Real = 0.5;
const ARM_LENGTH: Real = 4.0;
const WHEEL_RADIUS: Real = 1.0;
const WHEEL_RATE: Real = 2.0;

const FRAME_DT: Real = 1.0 / 60.0;
const STEP_DT: Real = 1.0 / 120.0;
const FRAMES: u32 = 600;
const REPORT_EVERY: u32 = 120;

fn load_config() -> Result<SpaceConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| PhysicsError::InvalidArgument(format!("cannot read {}: {}", path, e)))?;
            SpaceConfig::from_json(&json)
        }
        None => Ok(SpaceConfig::default()
            .with_gravity(Vect::new(0.0, -9.8))
            .with_iterations(20)
            .with_sleep_time_threshold(0.5)),
    }
}

fn build_ground(space: &mut Space) -> Result<ShapeHandle> {
    let ground = Shape::segment(Vect::new(-GROUND_HALF_W, 0.0), Vect::new(GROUND_HALF_W, 0.0), 0.1)?
        .with_friction(1.0)?;
    space.add_shape(space.static_body(), ground)
}

fn build_stack(space: &mut Space) -> Result<Vec<BodyHandle>> {
    let mut boxes = Vec::with_capacity(STACK_ROWS);
    for row in 0..STACK_ROWS {
        let y = BOX_SIZE * (row as Real + 0.5);
        let body = space.add_body(Body::dynamic().with_position(Vect::new(0.0, y)))?;
        let shape = Shape::box_shape(BOX_SIZE, BOX_SIZE, 0.0)?
            .with_mass(1.0)?
            .with_friction(0.7)?;
        space.add_shape(body, shape)?;
        boxes.push(body);
    }
    Ok(boxes)
}

/// Ball on a pinned arm, released from horizontal.
fn build_pendulum(space: &mut Space) -> Result<BodyHandle> {
    let pivot = Vect::new(-6.0, 6.0);
    let anchor = space.static_body();
    let ball = space.add_body(Body::dynamic().with_position(pivot + Vect::new(ARM_LENGTH, 0.0)))?;
    space.add_shape(ball, Shape::circle(BALL_RADIUS, Vect::ZERO)?.with_density(2.0)?.with_elasticity(0.5)?)?;
    space.add_constraint(Constraint::new(anchor, ball, PinJoint::new(pivot, Vect::ZERO))?)?;
    Ok(ball)
}

/// Wheel on an axle, spun by a motor against the static body.
fn build_wheel(space: &mut Space) -> Result<BodyHandle> {
    let axle = Vect::new(6.0, WHEEL_RADIUS + 0.5);
    let anchor = space.static_body();
    let wheel = space.add_body(Body::dynamic().with_position(axle))?;
    space.add_shape(wheel, Shape::circle(WHEEL_RADIUS, Vect::ZERO)?.with_mass(4.0)?.with_friction(0.9)?)?;
    space.add_constraint(Constraint::new(anchor, wheel, PivotJoint::new(axle, Vect::ZERO))?)?;
    space.add_constraint(Constraint::new(anchor, wheel, SimpleMotor::new(WHEEL_RATE))?.with_max_force(200.0)?)?;
    Ok(wheel)
}

fn main() -> Result<()> {
    env_logger::init();

    let mut space = Space::with_config(load_config()?)?;
    let ground = build_ground(&mut space)?;
    let boxes = build_stack(&mut space)?;
    let ball = build_pendulum(&mut space)?;
    let wheel = build_wheel(&mut space)?;
    info!(
        "space ready: {} bodies, {} shapes, {} constraints",
        space.body_count(),
        space.shape_count(),
        space.constraint_count()
    );

    let mut timestep = FixedTimestep::new(STEP_DT)?;
    let mut events: Vec<CollisionEvent> = Vec::new();
    let mut snapshots = SnapshotBuffer::new();

    for frame in 1..=FRAMES {
        space.advance_with(FRAME_DT, &mut timestep, &mut events)?;

        for event in events.drain(..) {
            let verb = if event.started { "began" } else { "ended" };
            info!("frame {}: contact {:?} / {:?} {}", frame, event.shape_a, event.shape_b, verb);
        }

        if frame % REPORT_EVERY == 0 {
            space.write_snapshots(&mut snapshots);
            let asleep = snapshots.rows().iter().filter(|row| row.is_sleeping()).count();
            let top = space.body(boxes[STACK_ROWS - 1])?.position();
            let swing = space.body(ball)?.position();
            let spin = space.body(wheel)?.angular_velocity();
            info!(
                "frame {}: top box at ({:.2}, {:.2}), ball at ({:.2}, {:.2}), wheel at {:.2} rad/s, {} of {} bodies asleep, {} bytes exported",
                frame,
                top.x,
                top.y,
                swing.x,
                swing.y,
                spin,
                asleep,
                snapshots.len(),
                snapshots.as_bytes().len()
            );
        }
    }

    let resting = space.arbiters_for_body(boxes[0]).len();
    let floor = space.point_query_nearest(Vect::new(0.0, -1.0), 2.0, ShapeFilter::ALL);
    info!(
        "done: bottom box has {} contacts, nearest shape below the stack is {:?} (ground {:?})",
        resting,
        floor.and_then(|hit| hit.shape),
        ground
    );
    Ok(())
}
