use crate::api::types::{BodyHandle, ShapeHandle};
use crate::collision::arbiter::Arbiter;

/// Callbacks fired while a space steps.
///
/// Handlers only see the arbiter, so the space cannot be changed from
/// inside a step. Every method has a pass-through default.
pub trait CollisionHandler {
    /// Two shapes started touching. Returning false ignores the pair until
    /// they separate.
    fn begin(&mut self, _arbiter: &mut Arbiter) -> bool {
        true
    }

    /// Called every step the shapes touch, before solving. Returning false
    /// skips the pair for this step only.
    fn pre_solve(&mut self, _arbiter: &mut Arbiter) -> bool {
        true
    }

    /// Called after solving; impulses are available here.
    fn post_solve(&mut self, _arbiter: &mut Arbiter) {}

    /// The shapes stopped touching, or one of them was removed.
    fn separate(&mut self, _arbiter: &mut Arbiter) {}
}

impl CollisionHandler for () {}

impl<H: CollisionHandler + ?Sized> CollisionHandler for &mut H {
    fn begin(&mut self, arbiter: &mut Arbiter) -> bool {
        (**self).begin(arbiter)
    }

    fn pre_solve(&mut self, arbiter: &mut Arbiter) -> bool {
        (**self).pre_solve(arbiter)
    }

    fn post_solve(&mut self, arbiter: &mut Arbiter) {
        (**self).post_solve(arbiter)
    }

    fn separate(&mut self, arbiter: &mut Arbiter) {
        (**self).separate(arbiter)
    }
}

/// Begin or separate notification recorded by `Vec<CollisionEvent>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEvent {
    pub shape_a: ShapeHandle,
    pub shape_b: ShapeHandle,
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// True for begin, false for separate.
    pub started: bool,
}

impl CollisionEvent {
    fn from_arbiter(arbiter: &Arbiter, started: bool) -> Self {
        let (shape_a, shape_b) = arbiter.shapes();
        let (body_a, body_b) = arbiter.bodies();
        Self { shape_a, shape_b, body_a, body_b, started }
    }
}

impl CollisionHandler for Vec<CollisionEvent> {
    fn begin(&mut self, arbiter: &mut Arbiter) -> bool {
        self.push(CollisionEvent::from_arbiter(arbiter, true));
        true
    }

    fn separate(&mut self, arbiter: &mut Arbiter) {
        self.push(CollisionEvent::from_arbiter(arbiter, false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::arena::Index;

    fn arbiter() -> Arbiter {
        let idx = |slot| Index { slot, generation: 1, arena: 0 };
        Arbiter::new(ShapeHandle(idx(3)), ShapeHandle(idx(4)), BodyHandle(idx(1)), BodyHandle(idx(2)))
    }

    #[test]
    fn unit_handler_accepts_everything() {
        let mut arb = arbiter();
        let mut handler = ();
        assert!(handler.begin(&mut arb));
        assert!(handler.pre_solve(&mut arb));
    }

    #[test]
    fn event_log_records_begin_and_separate() {
        let mut arb = arbiter();
        let mut events: Vec<CollisionEvent> = Vec::new();
        assert!(events.begin(&mut arb));
        events.post_solve(&mut arb);
        events.separate(&mut arb);
        assert_eq!(events.len(), 2);
        assert!(events[0].started);
        assert!(!events[1].started);
        assert_eq!(events[0].shape_a, arb.shapes().0);
        assert_eq!(events[1].body_b, arb.bodies().1);
    }

    #[test]
    fn mutable_reference_forwards() {
        struct Veto;
        impl CollisionHandler for Veto {
            fn begin(&mut self, _arbiter: &mut Arbiter) -> bool {
                false
            }
        }
        fn begin_with<H: CollisionHandler>(mut handler: H) -> bool {
            handler.begin(&mut arbiter())
        }
        let mut veto = Veto;
        assert!(!begin_with(&mut veto));
    }
}
