//! Coordinate correction from model-input space back to the original image.
//!
//! Two-stage layouts either clamp center boxes to the image
//! ([`clamp_to_image`]) or rescale corner boxes with [`reduce_coordinates`].
//! Anchor-grid layouts optionally undo centered letterbox padding with
//! [`Letterbox`]; [`ImageMapping`] then applies the gain ratio rescale and
//! builds the final corners.

use crate::detection::Detection;
use crate::geometry::{BoxGeometry, CenterBox, CornerBox};
use crate::util::math::is_near_zero;
use crate::util::{DetPostError, DetPostResult};

/// How the original image was resized into the model input.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ResizeMode {
    /// Independent x/y scaling to the model size.
    #[default]
    Stretch,
    /// Aspect-preserving resize with the given scale factor.
    KeepAspectRatio {
        /// Ratio between resized and original size.
        scaling: f32,
    },
}

/// Per-image resize metadata.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResizeInfo {
    /// Model input width.
    pub width_resize: u32,
    /// Model input height.
    pub height_resize: u32,
    /// Original image width.
    pub width_original: u32,
    /// Original image height.
    pub height_original: u32,
    /// Resize policy used by the preprocessing stage.
    pub resize_mode: ResizeMode,
    /// Region of the original image that was fed to the model, if cropped.
    pub crop: Option<CornerBox>,
}

impl ResizeInfo {
    /// Creates resize info for a stretched, uncropped image.
    pub fn new(
        width_resize: u32,
        height_resize: u32,
        width_original: u32,
        height_original: u32,
    ) -> Self {
        Self {
            width_resize,
            height_resize,
            width_original,
            height_original,
            resize_mode: ResizeMode::Stretch,
            crop: None,
        }
    }

    /// Sets the resize policy.
    pub fn with_resize_mode(mut self, mode: ResizeMode) -> Self {
        self.resize_mode = mode;
        self
    }

    /// Marks the model input as a crop of the original image.
    pub fn with_crop(mut self, crop: CornerBox) -> Self {
        self.crop = Some(crop);
        self
    }

    /// Target width, height and origin offset, honoring the crop region.
    pub(crate) fn image_extent(&self) -> (f32, f32, f32, f32) {
        match self.crop {
            Some(crop) => (
                crop.width().trunc(),
                crop.height().trunc(),
                crop.x0,
                crop.y0,
            ),
            None => (
                self.width_original as f32,
                self.height_original as f32,
                0.0,
                0.0,
            ),
        }
    }
}

/// Converts a center box to corners clamped to `[0, size - 1]`.
pub fn clamp_to_image(b: &CenterBox, image_width: f32, image_height: f32) -> CornerBox {
    let corners = b.corners();
    let max_x = image_width - 1.0;
    let max_y = image_height - 1.0;
    CornerBox {
        x0: corners.x0.max(0.0).min(max_x),
        y0: corners.y0.max(0.0).min(max_y),
        x1: corners.x1.max(0.0).min(max_x),
        y1: corners.y1.max(0.0).min(max_y),
    }
}

/// Letterbox geometry: the network size and the unpadded image size inside it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    net_width: f32,
    net_height: f32,
    new_width: f32,
    new_height: f32,
}

impl Letterbox {
    /// Computes the letterbox for an image placed into a network input.
    ///
    /// The scaled image size is computed in integer pixels, matching how the
    /// padding was produced.
    pub fn new(
        net_width: u32,
        net_height: u32,
        img_width: u32,
        img_height: u32,
    ) -> DetPostResult<Self> {
        if img_width == 0 || img_height == 0 {
            return Err(DetPostError::InvalidParam {
                reason: "letterbox image size must be non-zero",
            });
        }
        let (new_width, new_height) = if (net_width as f32 / img_width as f32)
            < (net_height as f32 / img_height as f32)
        {
            let h = u64::from(img_height) * u64::from(net_width) / u64::from(img_width);
            (u64::from(net_width), h)
        } else {
            let w = u64::from(img_width) * u64::from(net_height) / u64::from(img_height);
            (w, u64::from(net_height))
        };
        if new_width == 0 || new_height == 0 {
            return Err(DetPostError::InvalidParam {
                reason: "letterbox content size collapsed to zero",
            });
        }
        Ok(Self {
            net_width: net_width as f32,
            net_height: net_height as f32,
            new_width: new_width as f32,
            new_height: new_height as f32,
        })
    }

    /// Maps a normalized network-space box to normalized image space.
    pub fn undo(&self, b: &CenterBox) -> CenterBox {
        let pad_x = (self.net_width - self.new_width) / 2.0;
        let pad_y = (self.net_height - self.new_height) / 2.0;
        CenterBox {
            x: (b.x * self.net_width - pad_x) / self.new_width,
            y: (b.y * self.net_height - pad_y) / self.new_height,
            w: b.w * (self.net_width / self.new_width),
            h: b.h * (self.net_height / self.new_height),
        }
    }
}

/// Final mapping from normalized boxes to original-image corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageMapping {
    width_ratio: f32,
    height_ratio: f32,
    image_width: f32,
    image_height: f32,
    offset_x: f32,
    offset_y: f32,
}

impl ImageMapping {
    /// Builds the gain ratio mapping for an image resized keeping its aspect
    /// ratio.
    pub fn new(info: &ResizeInfo) -> DetPostResult<Self> {
        let (image_width, image_height, offset_x, offset_y) = checked_extent(info)?;
        let model_width = info.width_resize as f32;
        let model_height = info.height_resize as f32;
        let gain = (model_width / image_width).min(model_height / image_height);
        let width_ratio = image_width * gain / model_width;
        let height_ratio = image_height * gain / model_height;
        if is_near_zero(width_ratio) || is_near_zero(height_ratio) {
            return Err(DetPostError::InvalidParam {
                reason: "image to model ratio is zero",
            });
        }
        Ok(Self {
            width_ratio,
            height_ratio,
            image_width,
            image_height,
            offset_x,
            offset_y,
        })
    }

    /// Rescales a normalized center box and clamps it to the image.
    pub fn map(&self, b: &CenterBox) -> CornerBox {
        let left = (b.x - b.w / 2.0) / self.width_ratio;
        let top = (b.y - b.h / 2.0) / self.height_ratio;
        let right = (b.x + b.w / 2.0) / self.width_ratio;
        let bottom = (b.y + b.h / 2.0) / self.height_ratio;
        CornerBox {
            x0: if left > 0.0 { left * self.image_width } else { 0.0 } + self.offset_x,
            y0: if top > 0.0 { top * self.image_height } else { 0.0 } + self.offset_y,
            x1: if right <= 1.0 {
                right * self.image_width
            } else {
                self.image_width
            } + self.offset_x,
            y1: if bottom <= 1.0 {
                bottom * self.image_height
            } else {
                self.image_height
            } + self.offset_y,
        }
    }
}

fn checked_extent(info: &ResizeInfo) -> DetPostResult<(f32, f32, f32, f32)> {
    let extent = info.image_extent();
    if is_near_zero(info.width_resize as f32)
        || is_near_zero(info.height_resize as f32)
        || is_near_zero(extent.0)
        || is_near_zero(extent.1)
    {
        return Err(DetPostError::InvalidParam {
            reason: "image and model sizes must be non-zero",
        });
    }
    Ok(extent)
}

/// Maps corner detections from model space to original-image pixels.
///
/// `normalized` says whether the boxes are already in `[0, 1]`; otherwise
/// they are first divided by the model input size. Keep-aspect-ratio resizes
/// drop boxes that start outside the image and clamp the far corner.
pub fn reduce_coordinates(
    dets: &mut Vec<Detection>,
    info: &ResizeInfo,
    normalized: bool,
) -> DetPostResult<()> {
    let (img_w, img_h, offset_x, offset_y) = info.image_extent();

    if !normalized && info.width_resize > 0 && info.height_resize > 0 {
        let rw = info.width_resize as f32;
        let rh = info.height_resize as f32;
        for det in dets.iter_mut() {
            det.bbox.x0 /= rw;
            det.bbox.x1 /= rw;
            det.bbox.y0 /= rh;
            det.bbox.y1 /= rh;
        }
    }

    match info.resize_mode {
        ResizeMode::Stretch => {
            for det in dets.iter_mut() {
                det.bbox.x0 *= img_w;
                det.bbox.x1 *= img_w;
                det.bbox.y0 *= img_h;
                det.bbox.y1 *= img_h;
            }
        }
        ResizeMode::KeepAspectRatio { scaling } => {
            if is_near_zero(scaling) {
                return Err(DetPostError::InvalidParam {
                    reason: "keep-aspect-ratio scaling must be non-zero",
                });
            }
            let sx = info.width_resize as f32 / scaling;
            let sy = info.height_resize as f32 / scaling;
            dets.retain_mut(|det| {
                det.bbox.x0 *= sx;
                det.bbox.y0 *= sy;
                det.bbox.x1 *= sx;
                det.bbox.y1 *= sy;
                if det.bbox.x0 > img_w || det.bbox.y0 > img_h {
                    return false;
                }
                det.bbox.x1 = det.bbox.x1.min(img_w);
                det.bbox.y1 = det.bbox.y1.min(img_h);
                true
            });
        }
    }

    if info.crop.is_some() {
        for det in dets.iter_mut() {
            det.bbox.x0 += offset_x;
            det.bbox.x1 += offset_x;
            det.bbox.y0 += offset_y;
            det.bbox.y1 += offset_y;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        clamp_to_image, reduce_coordinates, ImageMapping, Letterbox, ResizeInfo, ResizeMode,
    };
    use crate::detection::Detection;
    use crate::geometry::{CenterBox, CornerBox};

    #[test]
    fn clamp_limits_to_last_pixel() {
        let b = CenterBox::new(5.0, 95.0, 20.0, 20.0);
        let c = clamp_to_image(&b, 100.0, 100.0);
        assert_eq!(c, CornerBox::new(0.0, 85.0, 15.0, 99.0));
    }

    #[test]
    fn letterbox_undo_removes_vertical_padding() {
        // 640x480 into 640x640: content is 640x480 with 80px bands.
        let lb = Letterbox::new(640, 640, 640, 480).unwrap();
        let b = lb.undo(&CenterBox::new(0.5, 0.125, 0.25, 0.25));
        assert!((b.x - 0.5).abs() < 1e-6);
        assert!(b.y.abs() < 1e-6);
        assert!((b.w - 0.25).abs() < 1e-6);
        assert!((b.h - 0.25 * 640.0 / 480.0).abs() < 1e-6);
    }

    #[test]
    fn letterbox_rejects_empty_image() {
        assert!(Letterbox::new(640, 640, 0, 480).is_err());
    }

    #[test]
    fn mapping_scales_and_clamps() {
        let info = ResizeInfo::new(100, 100, 200, 200);
        let mapping = ImageMapping::new(&info).unwrap();
        let c = mapping.map(&CenterBox::new(0.5, 0.05, 0.2, 0.2));
        assert!((c.x0 - 80.0).abs() < 1e-4);
        assert_eq!(c.y0, 0.0);
        assert!((c.x1 - 120.0).abs() < 1e-4);
        assert!((c.y1 - 30.0).abs() < 1e-4);
    }

    #[test]
    fn stretch_reduction_from_model_pixels() {
        let info = ResizeInfo::new(100, 50, 400, 100);
        let mut dets = vec![Detection::new(CornerBox::new(10.0, 10.0, 50.0, 40.0), 0, 0.9)];
        reduce_coordinates(&mut dets, &info, false).unwrap();
        let b = dets[0].bbox;
        let expected = CornerBox::new(40.0, 20.0, 200.0, 80.0);
        assert!((b.x0 - expected.x0).abs() < 1e-3);
        assert!((b.y0 - expected.y0).abs() < 1e-3);
        assert!((b.x1 - expected.x1).abs() < 1e-3);
        assert!((b.y1 - expected.y1).abs() < 1e-3);
    }

    #[test]
    fn keep_aspect_ratio_drops_and_clamps() {
        let info = ResizeInfo::new(100, 100, 200, 100)
            .with_resize_mode(ResizeMode::KeepAspectRatio { scaling: 0.5 });
        let mut dets = vec![
            Detection::new(CornerBox::new(0.1, 0.1, 0.9, 0.9), 0, 0.9),
            Detection::new(CornerBox::new(0.1, 0.6, 0.2, 0.7), 1, 0.8),
        ];
        reduce_coordinates(&mut dets, &info, true).unwrap();
        assert_eq!(dets.len(), 1);
        let b = dets[0].bbox;
        assert!((b.x0 - 20.0).abs() < 1e-4);
        assert!((b.x1 - 180.0).abs() < 1e-4);
        assert!((b.y1 - 100.0).abs() < 1e-4);
    }

    #[test]
    fn crop_offsets_are_added_last() {
        let info = ResizeInfo::new(100, 100, 1000, 1000)
            .with_crop(CornerBox::new(300.0, 200.0, 500.0, 400.0));
        let mut dets = vec![Detection::new(CornerBox::new(0.0, 0.0, 0.5, 0.5), 0, 0.9)];
        reduce_coordinates(&mut dets, &info, true).unwrap();
        assert_eq!(dets[0].bbox, CornerBox::new(300.0, 200.0, 400.0, 300.0));
    }
}
