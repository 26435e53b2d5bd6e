pub mod paystack;
pub mod stripe;

pub use paystack::PaystackGateway;
pub use stripe::StripeGateway;
