//! assetlens-api: Shared asset and wire types
//!
//! Contains the cached `Asset` model, the seed attributes used when creating
//! devices, and the request/response shapes of the NSoT inventory API.

pub mod asset;
pub mod requests;
pub mod responses;

pub use asset::{Asset, RECOGNIZED_ATTRIBUTES, SeedAttributes, UNASSIGNED_GROUP};
pub use requests::NewDevice;
pub use responses::{AttributeValue, ChangePage, ChangeRecord, ChangeResource, Device, Site};
