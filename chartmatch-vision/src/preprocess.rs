use anyhow::Result;
use image::DynamicImage;
use ndarray::Array4;
use serde::{Deserialize, Serialize};

/// Per-channel ImageNet means in BGR order, as used by the Keras ResNet-50
/// "caffe" preprocessing.
pub const IMAGENET_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

/// Memory layout of the model's image input and feature-map output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// [1, 3, H, W], the usual layout for PyTorch exports
    Nchw,
    /// [1, H, W, 3], the usual layout for Keras/TF exports
    #[default]
    Nhwc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessConfig {
    pub input_size: u32,
    pub layout: Layout,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_size: 224,
            layout: Layout::Nhwc,
        }
    }
}

/// Convert a decoded image into the model input tensor.
///
/// The image is resized to `input_size x input_size` with nearest-neighbour
/// sampling, converted to BGR and mean-centred per channel. Values stay in the
/// [0, 255] range before centring.
pub fn to_input_tensor(img: &DynamicImage, cfg: &PreprocessConfig) -> Result<Array4<f32>> {
    anyhow::ensure!(cfg.input_size > 0, "input size must be positive");

    let size = cfg.input_size;
    let resized = img.resize_exact(size, size, image::imageops::FilterType::Nearest);
    let rgb = resized.to_rgb8();

    let side = size as usize;
    let pixel_count = side * side;
    let pixels = rgb.as_raw();

    let tensor = match cfg.layout {
        Layout::Nchw => {
            let mut data = vec![0.0f32; 3 * pixel_count];
            let (b_channel, rest) = data.split_at_mut(pixel_count);
            let (g_channel, r_channel) = rest.split_at_mut(pixel_count);
            for i in 0..pixel_count {
                let idx = i * 3;
                r_channel[i] = pixels[idx] as f32 - IMAGENET_MEAN_BGR[2];
                g_channel[i] = pixels[idx + 1] as f32 - IMAGENET_MEAN_BGR[1];
                b_channel[i] = pixels[idx + 2] as f32 - IMAGENET_MEAN_BGR[0];
            }
            Array4::from_shape_vec((1, 3, side, side), data)?
        }
        Layout::Nhwc => {
            let mut data = Vec::with_capacity(3 * pixel_count);
            for px in pixels.chunks_exact(3) {
                data.push(px[2] as f32 - IMAGENET_MEAN_BGR[0]);
                data.push(px[1] as f32 - IMAGENET_MEAN_BGR[1]);
                data.push(px[0] as f32 - IMAGENET_MEAN_BGR[2]);
            }
            Array4::from_shape_vec((1, side, side, 3), data)?
        }
    };

    Ok(tensor)
}

/// Reduce a raw model output to a flat feature vector.
///
/// 4-D feature maps are global-average-pooled over their spatial axes (which
/// axes those are depends on `layout`). `[1, D]` outputs are used as is and
/// any other rank is flattened.
pub fn pool_features(shape: &[i64], data: &[f32], layout: Layout) -> Result<Vec<f32>> {
    let expected: i64 = shape.iter().product();
    anyhow::ensure!(
        expected >= 0 && expected as usize == data.len(),
        "output shape {:?} does not match {} values",
        shape,
        data.len()
    );

    match shape {
        [1, a, b, c] => {
            let (channels, spatial) = match layout {
                Layout::Nchw => (*a as usize, (*b * *c) as usize),
                Layout::Nhwc => (*c as usize, (*a * *b) as usize),
            };
            anyhow::ensure!(
                channels > 0 && spatial > 0,
                "empty feature map shape {:?}",
                shape
            );

            let mut pooled = vec![0.0f32; channels];
            match layout {
                Layout::Nchw => {
                    for (ch, plane) in data.chunks_exact(spatial).enumerate() {
                        pooled[ch] = plane.iter().sum::<f32>() / spatial as f32;
                    }
                }
                Layout::Nhwc => {
                    for position in data.chunks_exact(channels) {
                        for (acc, v) in pooled.iter_mut().zip(position) {
                            *acc += v;
                        }
                    }
                    for acc in pooled.iter_mut() {
                        *acc /= spatial as f32;
                    }
                }
            }
            Ok(pooled)
        }
        [_, _, _, _] => {
            anyhow::bail!("unsupported batched feature map shape {:?}", shape)
        }
        _ => Ok(data.to_vec()),
    }
}
