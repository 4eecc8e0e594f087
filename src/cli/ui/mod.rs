mod advertisement_view;
mod painter;

pub(crate) use self::advertisement_view::{AdvertisementView, ScanSummaryView};
pub(crate) use self::painter::Painter;
