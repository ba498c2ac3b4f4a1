mod retry;
mod route53;

pub use retry::wait_until;
pub use route53::Route53Provider;
