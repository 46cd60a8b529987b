//! UI-free core: addresses, time axis, views, mapping, selection and cadence.

pub mod address;
pub mod form;
pub mod mapper;
pub mod readout;
pub mod scheduler;
pub mod selection;
pub mod time;
pub mod view;
