use crate::core::arena::Index;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) Index);

        impl $name {
            pub(crate) const LABEL: &'static str = $label;

            /// Arena slot backing this handle.
            pub fn slot(&self) -> u32 {
                self.0.slot()
            }
        }
    };
}

handle!(
    /// Handle to a body owned by a `Space`.
    BodyHandle,
    "body"
);

handle!(
    /// Handle to a shape owned by a `Space`.
    ShapeHandle,
    "shape"
);

handle!(
    /// Handle to a constraint owned by a `Space`.
    ConstraintHandle,
    "constraint"
);
