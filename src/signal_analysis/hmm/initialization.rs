pub mod kmeans;
pub mod init_method_structs;
pub mod hmm_initializer;
