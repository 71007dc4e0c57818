mod health_check;
mod multipart;
pub mod users;

pub use health_check::health_check;
pub use multipart::{read_multipart, FormData};
pub use users::SessionCookies;
