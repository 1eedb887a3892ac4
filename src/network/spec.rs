use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::ActivationFunction;
use crate::data::sample::IGNORE_INDEX;
use crate::error::{Result, SegError};
use crate::layers::{Activation, Conv2d, Layer, MaxPool2d, Upsample2d};
use crate::network::model::SegmentationModel;

/// Supported network layouts.
///
/// - `Fcn`    — a flat stack of same-padding convolutions; output resolution
///              never changes.
/// - `SegNet` — a two-stage encoder/decoder: max-pooling on the way down,
///              nearest upsampling on the way up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    Fcn,
    #[value(name = "segnet")]
    #[serde(rename = "segnet")]
    SegNet,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Fcn => "fcn",
            Architecture::SegNet => "segnet",
        }
    }

    /// Input height and width must be multiples of this.
    pub fn downsample_factor(&self) -> usize {
        match self {
            Architecture::Fcn => 1,
            Architecture::SegNet => 4,
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to build a freshly initialized model.
///
/// `feature_scale` divides the base channel width of every hidden layer,
/// so `feature_scale = 2` halves the network's width. Widths never drop
/// below one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub arch: Architecture,
    pub n_classes: usize,
    pub feature_scale: usize,
    pub in_channels: usize,
    pub activation: ActivationFunction,
}

impl ModelSpec {
    pub fn new(arch: Architecture, n_classes: usize, feature_scale: usize) -> ModelSpec {
        ModelSpec {
            arch,
            n_classes,
            feature_scale,
            in_channels: 3,
            activation: ActivationFunction::ReLU,
        }
    }

    fn width(&self, base: usize) -> usize {
        (base / self.feature_scale).max(1)
    }

    /// Checks the spec against the image size it will be trained on.
    pub fn validate(&self, img_rows: usize, img_cols: usize) -> Result<()> {
        self.validate_layout()?;
        let factor = self.arch.downsample_factor();
        if img_rows == 0 || img_cols == 0 || img_rows % factor != 0 || img_cols % factor != 0 {
            return Err(SegError::InvalidArchitecture(format!(
                "{} needs image sides that are non-zero multiples of {}, got {}x{}",
                self.arch, factor, img_rows, img_cols
            )));
        }
        Ok(())
    }

    /// Checks the parts of the spec that do not depend on the image size.
    fn validate_layout(&self) -> Result<()> {
        if self.feature_scale == 0 {
            return Err(SegError::InvalidArchitecture("feature_scale must be at least 1".into()));
        }
        if self.n_classes < 2 || self.n_classes >= IGNORE_INDEX as usize {
            return Err(SegError::InvalidArchitecture(format!(
                "n_classes must be in 2..{}, got {}",
                IGNORE_INDEX, self.n_classes
            )));
        }
        Ok(())
    }

    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<SegmentationModel> {
        self.validate_layout()?;
        let act = || Layer::Activation(Activation::new(self.activation));
        let layers = match self.arch {
            Architecture::Fcn => {
                let (w1, w2) = (self.width(32), self.width(64));
                vec![
                    Layer::Conv2d(Conv2d::he(self.in_channels, w1, 3, rng)),
                    act(),
                    Layer::Conv2d(Conv2d::he(w1, w1, 3, rng)),
                    act(),
                    Layer::Conv2d(Conv2d::he(w1, w2, 3, rng)),
                    act(),
                    Layer::Conv2d(Conv2d::xavier(w2, self.n_classes, 1, rng)),
                ]
            }
            Architecture::SegNet => {
                let (w1, w2) = (self.width(16), self.width(32));
                vec![
                    // encoder
                    Layer::Conv2d(Conv2d::he(self.in_channels, w1, 3, rng)),
                    act(),
                    Layer::MaxPool2d(MaxPool2d::new()),
                    Layer::Conv2d(Conv2d::he(w1, w2, 3, rng)),
                    act(),
                    Layer::MaxPool2d(MaxPool2d::new()),
                    // decoder
                    Layer::Upsample2d(Upsample2d::new(2)),
                    Layer::Conv2d(Conv2d::he(w2, w2, 3, rng)),
                    act(),
                    Layer::Upsample2d(Upsample2d::new(2)),
                    Layer::Conv2d(Conv2d::he(w2, w1, 3, rng)),
                    act(),
                    Layer::Conv2d(Conv2d::xavier(w1, self.n_classes, 1, rng)),
                ]
            }
        };

        Ok(SegmentationModel {
            arch: self.arch,
            n_classes: self.n_classes,
            in_channels: self.in_channels,
            layers,
        })
    }
}
