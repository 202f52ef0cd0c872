mod conn;
mod stage;
mod url;

pub use self::conn::*;
pub use self::stage::*;
pub use self::url::*;
