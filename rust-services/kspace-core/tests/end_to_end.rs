use std::fs::File;
use std::path::PathBuf;

use ndarray::{Array5, Array6};
use ndarray_npy::NpzWriter;
use num_complex::Complex32;

use kspace_core::loader::{NpzLoader, VolumeLoader};
use kspace_core::{
    reconstruct, CoilSelection, Domain, KSpaceVolume, SessionState, View, ViewEvent,
    ViewSelector, ViewerConfig, ViewerError, Viewport,
};

const IMPULSE: (usize, usize, usize) = (2, 5, 11); // coil, row, col

/// nt=2, nz=1, nc=4, 16x16, zero except a unit impulse in one coil at t=1.
fn impulse_volume() -> KSpaceVolume {
    let mut data = Array5::<Complex32>::zeros((2, 1, 4, 16, 16));
    let (c, y, x) = IMPULSE;
    data[[1, 0, c, y, x]] = Complex32::new(1.0, 0.0);
    KSpaceVolume::from_complex(data).unwrap()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("kspace-core-{}-{}", std::process::id(), name))
}

#[test]
fn impulse_is_flat_in_image_domain_and_a_point_in_kspace() {
    let mut session = SessionState::new(ViewerConfig::default());
    session.set_volume(impulse_volume()).unwrap();
    let composite = session.composite_view();

    let frame = session.handle(ViewEvent::SetTimeIndex(1)).unwrap();
    let kspace = frame.get(composite).unwrap();
    assert_eq!((kspace.width, kspace.height), (16, 16));
    let lit: Vec<(usize, usize)> = kspace
        .pixels
        .indexed_iter()
        .filter(|(_, p)| **p > 0)
        .map(|(idx, _)| idx)
        .collect();
    assert_eq!(lit, vec![(IMPULSE.1, IMPULSE.2)]);
    assert_eq!(kspace.pixels[[IMPULSE.1, IMPULSE.2]], 255);

    let frame = session.handle(ViewEvent::ToggleDomain).unwrap();
    let image = frame.get(composite).unwrap();
    assert!(image.pixels.iter().all(|&p| p == 255));

    // The frame without the impulse is blank in both domains.
    let frame = session.handle(ViewEvent::SetTimeIndex(0)).unwrap();
    assert!(frame.get(composite).unwrap().pixels.iter().all(|&p| p == 0));
}

#[test]
fn image_composite_matches_analytic_magnitude() {
    let vol = impulse_volume();
    let sel = ViewSelector { time_index: 1, slice_index: 0, domain: Domain::Image };
    let r = reconstruct(&vol, &sel, CoilSelection::All).unwrap();
    for v in r.composite.iter() {
        assert!((v - 1.0 / 256.0).abs() < 1e-7);
    }
    let k = reconstruct(&vol, &ViewSelector { domain: Domain::KSpace, ..sel }, CoilSelection::All).unwrap();
    assert!((k.composite[[IMPULSE.1, IMPULSE.2]] - 1.0f32.ln_1p()).abs() < 1e-6);
}

#[test]
fn mosaic_and_coil_tab_follow_domain_toggle() {
    let mut session = SessionState::new(ViewerConfig::default());
    session.set_volume(impulse_volume()).unwrap();
    session.handle(ViewEvent::SetTimeIndex(1)).unwrap();
    let (mosaic, _) = session
        .open_view(View::Mosaic, Viewport { width: 400, height: 400 })
        .unwrap();
    let (coil, _) = session.open_view(View::SingleCoil(IMPULSE.0), Viewport::default()).unwrap();

    let frame = session.handle(ViewEvent::ToggleDomain).unwrap();
    let coil_image = frame.get(coil).expect("coil view refreshed");
    assert!(coil_image.pixels.iter().all(|&p| p == 255));
    assert!(frame.get(mosaic).is_some());

    let frame = session.handle(ViewEvent::ToggleDomain).unwrap();
    let coil_image = frame.get(coil).unwrap();
    assert_eq!(coil_image.pixels.iter().filter(|&&p| p > 0).count(), 1);
}

#[test]
fn npz_with_real_and_imag_loads() {
    let path = temp_path("parts.npz");
    let mut real = Array5::<f32>::zeros((2, 1, 3, 4, 6));
    let mut imag = Array5::<f32>::zeros((2, 1, 3, 4, 6));
    real[[1, 0, 2, 3, 5]] = 2.0;
    imag[[1, 0, 2, 3, 5]] = -1.0;
    {
        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("real", &real).unwrap();
        npz.add_array("imag", &imag).unwrap();
        npz.finish().unwrap();
    }

    let vol = NpzLoader.load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(vol.shape().nc, 3);
    assert_eq!((vol.shape().ny, vol.shape().nx), (4, 6));
    assert_eq!(vol.plane(1, 0, 2).unwrap()[[3, 5]], Complex32::new(2.0, -1.0));
}

#[test]
fn npz_with_interleaved_f64_loads() {
    let path = temp_path("interleaved.npz");
    let mut raw = Array6::<f64>::zeros((1, 2, 1, 3, 3, 2));
    raw[[0, 1, 0, 1, 1, 1]] = 0.5;
    {
        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("kspace", &raw).unwrap();
        npz.finish().unwrap();
    }

    let vol = NpzLoader.load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(vol.shape().nz, 2);
    assert_eq!(vol.plane(0, 1, 0).unwrap()[[1, 1]], Complex32::new(0.0, 0.5));
}

#[test]
fn npz_with_wrong_keys_fails_without_touching_session() {
    let path = temp_path("wrong.npz");
    {
        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("projections", &Array5::<f32>::zeros((1, 1, 1, 2, 2))).unwrap();
        npz.finish().unwrap();
    }

    let mut session = SessionState::new(ViewerConfig::default());
    session.set_volume(impulse_volume()).unwrap();
    let err = session.handle(ViewEvent::Load(path.clone())).unwrap_err();
    std::fs::remove_file(&path).ok();

    assert!(matches!(err, ViewerError::LoadFailure { .. }));
    assert_eq!(session.volume().unwrap().shape().nc, 4);
    assert!(!session.handle(ViewEvent::SetTimeIndex(1)).unwrap().is_empty());
}
