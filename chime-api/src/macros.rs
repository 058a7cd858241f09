//! Helper macros for the API layer.

/// Macro to implement `FromRef<AppState>` for a state field.
///
/// # Example
/// ```ignore
/// impl_from_ref!(DomainEventPublisher, publisher);
/// // Expands to:
/// impl axum::extract::FromRef<AppState> for DomainEventPublisher {
///     fn from_ref(state: &AppState) -> Self {
///         state.publisher.clone()
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
