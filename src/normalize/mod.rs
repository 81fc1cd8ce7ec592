//! Normalization between the backend wire format and the internal model.

pub mod dto;
pub mod fields;
pub mod requests;

pub use dto::{
    map_consistency_check, map_content_matrix, map_day_article, map_experiment,
    map_experiments, map_identity_model, map_identity_models, map_launch_kit,
    map_monetization_map, map_persona, map_profile,
};
pub use fields::{ListField, energy_curve, growth_arc, string_list};
pub use requests::{DayArticleRequest, NewExperiment};
