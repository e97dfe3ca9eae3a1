#![no_main]

use libfuzzer_sys::fuzz_target;
use playq::engine::shared;
use playq::{ErrorPolicy, Loop, NullEngine, QueueConfig, QueueController, Track, Verbosity};

fuzz_target!(|data: &[u8]| {
    let config = QueueConfig {
        error_policy: ErrorPolicy::Degrade,
        verbosity: Verbosity::None,
        shuffle_seed: Some(0),
        ..QueueConfig::default()
    };
    let mut queue = QueueController::new(&config);
    let engine = shared(NullEngine::new(None, queue.diagnostics().clone()));
    if queue.add_player("^file://", engine).is_err() {
        return;
    }

    let len = (data.len() % 32).max(1);
    let tracks: Vec<Track> = (0..len)
        .map(|idx| Track::new(format!("track_{idx}"), "artist", format!("file:///track_{idx}.mp3")))
        .collect();
    if queue.set_track_list(tracks.clone()).is_err() {
        return;
    }

    for byte in data {
        let arg = usize::from(*byte >> 4);
        let _ = match byte % 10 {
            0 => queue.next(),
            1 => queue.previous(),
            2 => queue.set_index(arg),
            3 => queue.set_shuffling(true, arg % 2 == 0),
            4 => queue.set_shuffling(false, false),
            5 => queue.set_looping(match arg % 3 {
                0 => Loop::None,
                1 => Loop::List,
                _ => Loop::Single,
            }),
            6 => queue.play(),
            7 => queue.pause(),
            8 => queue.stop(),
            _ => queue.seek_to(u64::from(*byte) * 100),
        };

        let working = queue.working_list();
        assert!(queue.index() < working.len());
        assert_eq!(queue.get_current(), Some(working[queue.index()]));
        assert_eq!(queue.original_list(), tracks.as_slice());
    }
});
