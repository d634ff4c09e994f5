pub mod binning;
pub mod klett;
pub mod quality;
pub mod reduce;

pub use binning::{bin, AltitudeBin, AltitudeBinning, Binner};
pub use klett::{invert_channel, invert_klett, ChannelProfile, KlettInverter, KlettProfile};
pub use quality::{is_good, optical_depth, transmission, TransmissionChange};
pub use reduce::{reduce, ReducedTrace, Reducer};
