pub mod formant_warper;
pub mod mcadams_anonymizer;
pub mod noise_reducer;
pub mod normalizer;
pub mod pitch_time_modifier;
pub mod pre_emphasis_filter;
pub mod protection_noise_injector;
pub mod sequential_frame_executor;
pub mod stft;
pub mod threaded_frame_executor;
