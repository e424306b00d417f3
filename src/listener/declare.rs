//! Declarative listener registration
//!
//! `declare_listener!` records a listener declaration at link time. Nothing
//! reaches the registry until `register_declared_listeners` is called at
//! process init, so declaring a listener never mutates global state on its own.

use crate::listener::error::ListenerResult;
use crate::listener::registry::{register_listener, ListenerRegistration};

/// Link-time record of one `declare_listener!` invocation
pub struct ListenerDeclaration {
    pub factory: fn() -> ListenerRegistration,
}

inventory::collect!(ListenerDeclaration);

/// Declare a listener type together with its configuration
///
/// ```rust,no_run
/// # use joblistener::listener::api::*;
/// # use joblistener::queue::api::Message;
/// #[derive(Default)]
/// struct SendWelcomeEmail;
///
/// #[async_trait::async_trait]
/// impl JobListener for SendWelcomeEmail {
///     async fn handle(&self, _message: &Message, _context: &MessageContext) -> HandlerResult {
///         Ok(())
///     }
/// }
///
/// joblistener::declare_listener!(SendWelcomeEmail, ListenerConfig::new("emails").workers(2));
/// ```
#[macro_export]
macro_rules! declare_listener {
    ($listener_type:ty, $config:expr) => {
        $crate::__inventory::submit! {
            $crate::listener::api::ListenerDeclaration {
                factory: || $crate::listener::api::ListenerRegistration::of::<$listener_type>($config),
            }
        }
    };
}

/// Every declaration linked into the binary
pub fn declared_listeners() -> Vec<ListenerRegistration> {
    inventory::iter::<ListenerDeclaration>()
        .map(|declaration| (declaration.factory)())
        .collect()
}

/// Move every declaration into the registry
///
/// Returns the number of declarations processed. Stops at the first invalid
/// or conflicting declaration.
pub fn register_declared_listeners() -> ListenerResult<usize> {
    let declarations = declared_listeners();
    let count = declarations.len();
    for registration in declarations {
        register_listener(registration)?;
    }
    log::debug!("Registered {} declared listener(s)", count);
    Ok(count)
}
