pub mod event;
pub mod generation;
pub mod itinerary;
pub mod location;
pub mod page;
pub mod place;
pub mod point_of_interest;
pub mod restaurant;
pub mod review;
pub mod time;
