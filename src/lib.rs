pub mod signal_analysis;
pub mod transition_graph;
pub mod data_loading;
pub mod interface;
pub mod config;
pub mod pipeline;
