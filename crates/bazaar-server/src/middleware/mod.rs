// HTTP middleware implementations
// Authentication resolves the caller; the feature gate enforces subscription plans

pub mod auth;
pub mod feature_gate;

pub use auth::Authentication;
pub use feature_gate::FeatureGate;
