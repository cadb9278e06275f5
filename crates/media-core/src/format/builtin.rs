//! Formats known at startup

/// `(name, frame_size, frame_time_us, media_type, sample_rate, channels)`
pub static BUILTIN_FORMATS: &[(&str, u32, u32, &str, u32, u32)] = &[
    // Signed 16-bit linear PCM, 10ms frames
    ("slin", 160, 10000, "audio", 8000, 1),
    ("slin/16000", 320, 10000, "audio", 16000, 1),
    ("slin/32000", 640, 10000, "audio", 32000, 1),
    // G.711
    ("alaw", 80, 10000, "audio", 8000, 1),
    ("mulaw", 80, 10000, "audio", 8000, 1),
    // Compressed narrowband voice
    ("gsm", 33, 20000, "audio", 8000, 1),
    ("ilbc20", 38, 20000, "audio", 8000, 1),
    ("ilbc30", 50, 30000, "audio", 8000, 1),
    ("g729", 10, 10000, "audio", 8000, 1),
    ("g723", 24, 30000, "audio", 8000, 1),
    ("g726", 40, 10000, "audio", 8000, 1),
    // Variable rate
    ("speex", 0, 0, "audio", 8000, 1),
    ("plain", 0, 0, "text", 0, 1),
    // Video, 90kHz clock
    ("h261", 0, 0, "video", 90000, 1),
    ("h263", 0, 0, "video", 90000, 1),
    ("h264", 0, 0, "video", 90000, 1),
    ("mpv", 0, 0, "video", 90000, 1),
];
