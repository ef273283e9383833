mod launch;
mod probe;
mod pump;
mod wait;

pub use launch::{BrowserSession, LaunchOptions, launch, open_page};
pub use probe::ChromiumProbe;
pub use pump::{HOST_EVENT_BUFFER, route_from_url, spawn_pump};
pub use wait::{Attachment, attach, wait_until_ready};
