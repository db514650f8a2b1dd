use vidconv::{
    ConvolutionEngine, FilterMode, FixedSelector, Frame, FrameLoop, InMemorySink, Kernel,
    MemorySource, ModeSwitch, ReferenceEngine, ScheduledSelector, SessionConfig, SourceFrame,
    TickOutcome, prepare,
};

fn gradient(width: u32, height: u32, t: u8) -> Frame {
    let mut data = Vec::new();
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[
                (x * 13) as u8 ^ t,
                (y * 29) as u8,
                (x * y) as u8,
                200,
            ]);
        }
    }
    Frame::new(width, height, data).unwrap()
}

#[test]
fn filtered_frames_match_reference_engine() {
    let cfg = SessionConfig {
        threads: Some(2),
        ..SessionConfig::default()
    };
    let input: Vec<Frame> = (0..4).map(|t| gradient(20, 12, t)).collect();

    let mut lp = FrameLoop::new(&cfg).unwrap();
    let mut src = MemorySource::new(input.clone());
    let mut sink = InMemorySink::new();
    lp.run(
        &mut src,
        &mut FixedSelector(FilterMode::Accelerated),
        &mut sink,
        |_| {},
    )
    .unwrap();

    let kernel = prepare(&Kernel::sharpen());
    let mut reference = ReferenceEngine::new(4).unwrap();
    for ((_, out), frame) in sink.frames().iter().zip(input) {
        let mut expected = frame;
        reference
            .apply(expected.data_mut(), 20, 12, &kernel)
            .unwrap();
        assert_eq!(out, &expected);
    }
}

#[test]
fn switching_modes_keeps_reference_record_intact() {
    let cfg = SessionConfig {
        fps_window: 3,
        ..SessionConfig::default()
    };
    let mut lp = FrameLoop::new(&cfg).unwrap();
    let frames: Vec<Frame> = (0..12).map(|t| gradient(8, 8, t)).collect();
    let mut src = MemorySource::new(frames);
    let mut sink = InMemorySink::new();
    let mut sel = ScheduledSelector::parse("0:reference,5:accelerated").unwrap();

    let mut before = None;
    let mut fps_seen = Vec::new();
    loop {
        match lp.tick(&mut src, &mut sel, &mut sink).unwrap() {
            TickOutcome::Displayed(report) => {
                fps_seen.push((report.mode, report.fps.to_string()));
                if report.index.0 == 4 {
                    before = Some(lp.sampler().timing(FilterMode::Reference).clone());
                }
            }
            TickOutcome::Skipped => {}
            TickOutcome::Ended => break,
        }
    }

    let before = before.unwrap();
    let after = lp.sampler().timing(FilterMode::Reference);
    assert_eq!(after.recorded(), before.recorded());
    assert_eq!(after.mean_ms(), before.mean_ms());
    assert_eq!(
        lp.sampler().estimate_fps(FilterMode::Reference),
        before.estimate()
    );

    // the first `fps_window` readings of each mode are NaN
    let reference: Vec<_> = fps_seen
        .iter()
        .filter(|(m, _)| *m == FilterMode::Reference)
        .map(|(_, f)| f.as_str())
        .collect();
    assert_eq!(&reference[..3], &["NaN", "NaN", "NaN"]);
    assert_ne!(reference[3], "NaN");
    let accelerated: Vec<_> = fps_seen
        .iter()
        .filter(|(m, _)| *m == FilterMode::Accelerated)
        .map(|(_, f)| f.as_str())
        .collect();
    assert_eq!(accelerated.len(), 7);
    assert_eq!(accelerated[0], "NaN");
    assert!(accelerated[3].parse::<f64>().unwrap() > 0.0);
}

#[test]
fn mode_switch_takes_effect_on_next_tick() {
    let mut lp = FrameLoop::new(&SessionConfig::default()).unwrap();
    let f = gradient(10, 10, 0);
    let mut src = MemorySource::new(vec![f.clone(), f.clone()]);
    let mut sink = InMemorySink::new();
    let mut switch = ModeSwitch::new(FilterMode::None);
    let handle = switch.clone();

    lp.tick(&mut src, &mut switch, &mut sink).unwrap();
    handle.set(FilterMode::Reference);
    lp.tick(&mut src, &mut switch, &mut sink).unwrap();

    assert_eq!(sink.frames()[0].1, f);
    assert_ne!(sink.frames()[1].1, f);
    assert_eq!(lp.stats().displayed_in(FilterMode::None), 1);
    assert_eq!(lp.stats().displayed_in(FilterMode::Reference), 1);
}

#[test]
fn malformed_kernel_fails_at_startup() {
    let cfg = SessionConfig {
        kernel: vec![vec![1, 2], vec![3, 4]],
        ..SessionConfig::default()
    };
    assert!(FrameLoop::new(&cfg).is_err());
}

#[test]
fn stall_then_end_yields_no_frames() {
    let mut lp = FrameLoop::new(&SessionConfig::default()).unwrap();
    let mut src = MemorySource::scripted([SourceFrame::Stalled]);
    let mut sink = InMemorySink::new();
    let mut sel = FixedSelector(FilterMode::Accelerated);
    assert_eq!(
        lp.tick(&mut src, &mut sel, &mut sink).unwrap(),
        TickOutcome::Skipped
    );
    assert_eq!(
        lp.tick(&mut src, &mut sel, &mut sink).unwrap(),
        TickOutcome::Ended
    );
    assert!(sink.frames().is_empty());
}
