use std::fmt::Debug;

/// Generic trait for the group of tensors a kernel launch consumes.
///
/// `N` is the number of tensors in the bundle.
pub trait TensorBundle<T: Debug + Clone + Send, const N: usize>:
    Sized + Clone + Send + Debug
{
    /// Borrows every tensor alongside its argument name, in field order.
    /// The names show up in precondition errors.
    fn named(&self) -> [(&'static str, &T); N];
}

/// Declares a tensor bundle struct with automatic TensorBundle implementation.
///
/// # Example
/// ```ignore
/// tensor_bundle! {
///     /// My bundle of tensors
///     pub struct MyInputs[2] { grad, indices }
/// }
/// ```
///
/// This generates:
/// - The struct with all fields public
/// - `TensorBundle<T, N>` impl with `named`
#[macro_export]
macro_rules! tensor_bundle {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident [$n:literal] { $first_field:ident $(, $field:ident)* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name<T> {
            pub $first_field: T,
            $(pub $field: T,)*
        }

        impl<T: std::fmt::Debug + Clone + Send> $crate::kernels::TensorBundle<T, $n> for $name<T> {
            fn named(&self) -> [(&'static str, &T); $n] {
                [
                    (stringify!($first_field), &self.$first_field)
                    $(, (stringify!($field), &self.$field))*
                ]
            }
        }
    };
}

pub use crate::tensor_bundle;
