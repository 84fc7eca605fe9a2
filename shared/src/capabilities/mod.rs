mod http;
mod timer;

pub use self::http::{classify, Fetched, Http, HttpError, HttpResult, ValidatedUrl, MAX_URL_LENGTH};
pub use self::timer::{Timer, TimerOperation, TimerOutput};

// Crux's built-in Render capability covers view updates as-is.
pub use crux_core::render::Render;

#[allow(unused_imports)]
use crate::app::App;
use crate::event::Event;

// Field types stay spelled out: the Effect derive names variants after them.
#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub timer: Timer<Event>,
    pub render: Render<Event>,
}
