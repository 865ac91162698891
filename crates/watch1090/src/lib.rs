/*!
 * watch1090 reconstructs per-aircraft state from a live or recorded
 * stream of Mode S / ADS-B surveillance messages.
 *
 * The crate is organised along the data flow:
 *
 * - [`source`]: the three wire framings (AVR, SBS1, Beast) and the
 *   canonical raw-frame record;
 * - [`decode`]: the Mode S downlink parser and the CPR position
 *   resolver;
 * - [`track`]: the per-aircraft state machine, change detection and
 *   the sharded registry;
 * - [`event`]: everything observers can see;
 * - [`pipeline`]: producers, decode workers, middleware, the event
 *   bus and lifecycle.
 */

pub mod decode;
pub mod event;
pub mod pipeline;
pub mod source;
pub mod track;

pub mod prelude {
    pub use crate::decode::adsb::Me;
    pub use crate::decode::cpr::{CprError, CprFormat, Position};
    pub use crate::decode::{Df, Icao, ModeS};
    pub use crate::event::{Event, LogLevel};
    pub use crate::pipeline::bus::Sink;
    pub use crate::pipeline::middleware::{Dedup, Middleware};
    pub use crate::pipeline::producers::{FileProducer, TcpProducer};
    pub use crate::pipeline::{Pipeline, PipelineConfig, Producer};
    pub use crate::source::{Frame, InputFormat, SourceTag};
    pub use crate::track::{Plane, Registry};
}
