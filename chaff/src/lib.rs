#![doc(issue_tracker_base_url = "https://github.com/chainbound/chaff/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub use chaff_common::*;
pub use chaff_framework::*;
pub use chaff_machine::*;
