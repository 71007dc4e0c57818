/// Account services
///
/// Business operations sitting between the HTTP layer and the directory,
/// token and media backends.

pub mod compensation;
mod profile;
mod registration;
mod resolver;
mod session;

pub use profile::{ImageSlot, ProfileService};
pub use registration::{RegistrationForm, RegistrationSaga};
pub use resolver::IdentityResolver;
pub use session::{LoginCredentials, Session, SessionService};
