use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::Context;
use image::{GrayImage, Luma};
use log::info;
use ndarray::ArrayView2;

/// The most (image, label) pairs a view shows at once.
pub const MAX_PAIRS: usize = 10;

/// Somewhere to show images along with the label the model predicted for them.
pub trait PredictionView {
    /// Shows up to `MAX_PAIRS` pairs, the rest are ignored.
    fn show(&mut self, pairs: &[(ArrayView2<f32>, u8)]) -> anyhow::Result<()>;
}

/// Writes the images side by side into a grayscale PNG strip.
pub struct StripView {
    path: PathBuf,
}

impl StripView {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

/// Maps the values of an image into `0..=255`.
fn to_gray(image: &ArrayView2<f32>) -> impl Fn(f32) -> u8 {
    let min = image.fold(f32::INFINITY, |acc, &v| acc.min(v));
    let max = image.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    let range = if max > min { max - min } else { 1. };

    move |v| ((v - min) / range * 255.).round().clamp(0., 255.) as u8
}

impl PredictionView for StripView {
    fn show(&mut self, pairs: &[(ArrayView2<f32>, u8)]) -> anyhow::Result<()> {
        let pairs = &pairs[..pairs.len().min(MAX_PAIRS)];
        let Some((first, _)) = pairs.first() else {
            return Ok(());
        };

        let (height, width) = first.dim();
        let mut strip = GrayImage::new((width * pairs.len()) as u32, height as u32);

        for (k, (image, _)) in pairs.iter().enumerate() {
            let gray = to_gray(image);
            for ((y, x), &v) in image.indexed_iter() {
                if y < height && x < width {
                    strip.put_pixel((k * width + x) as u32, y as u32, Luma([gray(v)]));
                }
            }
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        strip
            .save(&self.path)
            .with_context(|| format!("cannot write '{}'", self.path.display()))?;

        let labels: Vec<_> = pairs.iter().map(|(_, label)| label.to_string()).collect();
        info!(
            "wrote {} predictions to {}: {}",
            pairs.len(),
            self.path.display(),
            labels.join(" ")
        );

        Ok(())
    }
}

/// Prints the predicted labels on a single line.
pub struct ConsoleView<W: Write> {
    out: W,
}

impl ConsoleView<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> PredictionView for ConsoleView<W> {
    fn show(&mut self, pairs: &[(ArrayView2<f32>, u8)]) -> anyhow::Result<()> {
        let labels: Vec<_> = pairs
            .iter()
            .take(MAX_PAIRS)
            .map(|(_, label)| label.to_string())
            .collect();

        writeln!(self.out, "Predicted: {}", labels.join(" "))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use ndarray::Array2;

    use super::*;

    #[test]
    fn console_view_prints_at_most_ten_labels() {
        let image = Array2::<f32>::zeros((28, 28));
        let pairs: Vec<_> = (0..12).map(|i| (image.view(), (i % 10) as u8)).collect();

        let mut out = Vec::new();
        ConsoleView::new(&mut out).show(&pairs).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Predicted: 0 1 2 3 4 5 6 7 8 9\n");
    }

    #[test]
    fn strip_view_lays_images_side_by_side() {
        let path = env::temp_dir().join("mnist_pipelines_strip").join("strip.png");

        let mut bright = Array2::<f32>::zeros((28, 28));
        bright[[0, 0]] = 1.;
        let dark = Array2::<f32>::zeros((28, 28));
        let pairs = [(dark.view(), 1), (bright.view(), 7), (dark.view(), 3)];

        StripView::new(&path).show(&pairs).unwrap();

        let strip = image::open(&path).unwrap().to_luma8();
        assert_eq!(strip.dimensions(), (3 * 28, 28));
        assert_eq!(strip.get_pixel(28, 0).0, [255]);
        assert_eq!(strip.get_pixel(0, 0).0, [0]);
    }
}
