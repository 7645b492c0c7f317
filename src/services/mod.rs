pub mod generation_service;
pub mod itinerary_service;
pub mod llm_service;
pub mod place_service;
pub mod resource_service;
pub mod review_service;
pub mod scheduler;
