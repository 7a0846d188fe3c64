pub mod approval;
pub mod email;
pub mod invites;
pub mod notifier;
pub mod registration;

pub use approval::{AccountView, ApprovalService};
pub use email::EmailService;
pub use invites::InviteService;
pub use notifier::EmailNotifier;
pub use registration::RegistrationService;
