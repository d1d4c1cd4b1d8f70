//! Credit purchase flow.
//!
//! 1. User picks a credit package from the static catalog
//! 2. A checkout session is recorded locally and opened with the Payment
//!    Provider (redirect URL returned to the client)
//! 3. The client polls the completion status after redirect
//! 4. On `complete`, the session is finalized and credits are granted
//!    atomically — finalization is idempotent, so a purchase confirmation is
//!    applied at most once no matter how often the status page reloads

pub mod catalog;
pub mod checkout;
pub mod provider;

pub use catalog::{find_package, CreditPackage, PACKAGES};
pub use checkout::{CheckoutError, CheckoutSession, CheckoutStatus, CheckoutStore};
pub use provider::{PaymentProvider, ProviderSession, ProviderStatus, StripeCheckout};
