pub mod hmm_analyzer;
