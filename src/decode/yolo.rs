use crate::config::{BoxDecoding, GridLayout, PostProcessConfig, YoloLayout};
use crate::correct::{ImageMapping, Letterbox, ResizeInfo};
use crate::decode::{image_slice, labeled, require, shared_batch, Decode, Elem};
use crate::detection::{Candidate, Detection};
use crate::geometry::CenterBox;
use crate::nms::suppress;
use crate::tensor::{TensorData, TensorView};
use crate::trace::trace_event;
use crate::util::math::sigmoid;
use crate::util::{DetPostError, DetPostResult};

/// Stride of the finest feature layer relative to the network input.
const BASE_STRIDE: usize = 32;

/// Decoder for anchor-grid single-stage models.
///
/// Every input tensor is one feature layer. Each `(cell, anchor)` slot holds
/// `tx, ty, tw, th, objectness` followed by one logit per class. Decoded boxes
/// live in normalized network space until letterbox removal and the final
/// mapping to image pixels.
#[derive(Clone, Copy, Debug)]
pub struct YoloDecoder<'a> {
    layout: &'a YoloLayout,
    class_num: usize,
}

/// Geometry of one feature layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct LayerDims {
    height: usize,
    width: usize,
}

impl<'a> YoloDecoder<'a> {
    /// Creates a decoder for `class_num` classes.
    pub fn new(layout: &'a YoloLayout, class_num: usize) -> Self {
        Self { layout, class_num }
    }

    fn channels(&self) -> usize {
        5 + self.class_num
    }

    fn layer_dims(&self, index: usize, view: &TensorView<'_>) -> DetPostResult<LayerDims> {
        let shape = view.shape();
        let anchors = self.layout.anchor_dim;
        let ch = self.channels();
        let bad = |reason: &'static str| DetPostError::InvalidShape {
            tensor: index,
            shape: shape.to_vec(),
            reason,
        };
        match self.layout.grid_layout {
            GridLayout::Nhwc => match *shape {
                [_, h, w, c] if c == anchors * ch => Ok(LayerDims { height: h, width: w }),
                [_, _, _, _] => Err(bad("last dimension must be anchor_dim * (5 + classes)")),
                _ => Err(bad("NHWC layer must be rank 4")),
            },
            GridLayout::Nchw => match *shape {
                [_, c, h, w] if c == anchors * ch => Ok(LayerDims { height: h, width: w }),
                [_, _, _, _] => Err(bad("channel dimension must be anchor_dim * (5 + classes)")),
                _ => Err(bad("NCHW layer must be rank 4")),
            },
            GridLayout::Nchwc => match *shape {
                [_, a, h, w, c] if a == anchors && c == ch => Ok(LayerDims { height: h, width: w }),
                [_, _, _, _, _] => Err(bad("expected [N, anchor_dim, H, W, 5 + classes]")),
                _ => Err(bad("NCHWC layer must be rank 5")),
            },
        }
    }

    /// Anchor `(w, h)` pairs for a layer, chosen by its stride.
    fn anchors_for(&self, dims: LayerDims, net_width: u32) -> DetPostResult<&'a [f32]> {
        let per_layer = 2 * self.layout.anchor_dim;
        let groups = self.layout.anchors.len() / per_layer;
        if net_width == 0 || dims.width == 0 {
            return Err(DetPostError::InvalidParam {
                reason: "network and layer width must be non-zero",
            });
        }
        let ratio = (dims.width * BASE_STRIDE) as f32 / net_width as f32;
        let order = ratio.log2().trunc() as i64;
        let group = groups as i64 - 1 - order;
        if group < 0 || group >= groups as i64 {
            return Err(DetPostError::InvalidParam {
                reason: "no anchor group matches the layer stride",
            });
        }
        let start = group as usize * per_layer;
        self.layout
            .anchors
            .get(start..start + per_layer)
            .ok_or(DetPostError::InvalidParam {
                reason: "no anchor group matches the layer stride",
            })
    }

    /// Decodes every layer of one image into normalized network-space
    /// candidates, before letterbox removal and suppression.
    pub fn candidates(
        &self,
        tensors: &[TensorView<'_>],
        image: usize,
        net_width: u32,
        net_height: u32,
        config: &PostProcessConfig,
    ) -> DetPostResult<Vec<Candidate>> {
        let mut out = Vec::new();
        for (index, view) in tensors.iter().enumerate() {
            let dims = self.layer_dims(index, view)?;
            let anchors = self.anchors_for(dims, net_width)?;
            let data = image_slice(tensors, index, image)?;
            self.decode_layer(&data, dims, anchors, net_width, net_height, config, &mut out);
        }
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_layer(
        &self,
        data: &TensorData<'_>,
        dims: LayerDims,
        anchors: &[f32],
        net_width: u32,
        net_height: u32,
        config: &PostProcessConfig,
        out: &mut Vec<Candidate>,
    ) {
        let ch = self.channels();
        let stride = dims.height * dims.width;
        let anchor_dim = self.layout.anchor_dim;
        let (layer_w, layer_h) = (dims.width as f32, dims.height as f32);
        let (net_w, net_h) = (net_width as f32, net_height as f32);

        for j in 0..stride {
            for k in 0..anchor_dim {
                let (base, step) = match self.layout.grid_layout {
                    GridLayout::Nhwc => (ch * anchor_dim * j + k * ch, 1),
                    GridLayout::Nchw => (ch * stride * k + j, stride),
                    GridLayout::Nchwc => (ch * stride * k + j * ch, 1),
                };
                let value = |c: usize| data.f32_at(base + c * step);

                let Some(raw_obj) = value(4) else { continue };
                let objectness = sigmoid(raw_obj);
                if objectness <= self.layout.objectness_thresh {
                    continue;
                }

                let mut best = None;
                let mut max_prob = config.score_thresh;
                for c in 0..self.class_num {
                    let Some(raw) = value(5 + c) else { break };
                    let prob = sigmoid(raw) * objectness;
                    if prob > max_prob {
                        max_prob = prob;
                        best = Some(c);
                    }
                }
                let Some(class) = best else { continue };
                match config.threshold_for(class as i64) {
                    Some(thresh) if max_prob >= thresh => {}
                    _ => continue,
                }

                let (Some(tx), Some(ty), Some(tw), Some(th)) =
                    (value(0), value(1), value(2), value(3))
                else {
                    continue;
                };
                let (Some(&anchor_w), Some(&anchor_h)) =
                    (anchors.get(2 * k), anchors.get(2 * k + 1))
                else {
                    continue;
                };
                let col = (j % dims.width) as f32;
                let row = (j / dims.width) as f32;
                let bbox = match self.layout.box_decoding {
                    BoxDecoding::Quadratic => CenterBox {
                        x: (col + sigmoid(tx) * 2.0 - 0.5) / layer_w,
                        y: (row + sigmoid(ty) * 2.0 - 0.5) / layer_h,
                        w: (sigmoid(tw) * 2.0).powi(2) * anchor_w / net_w,
                        h: (sigmoid(th) * 2.0).powi(2) * anchor_h / net_h,
                    },
                    BoxDecoding::Exponential => CenterBox {
                        x: (col + sigmoid(tx)) / layer_w,
                        y: (row + sigmoid(ty)) / layer_h,
                        w: tw.exp() * anchor_w / net_w,
                        h: th.exp() * anchor_h / net_h,
                    },
                };
                out.push(Candidate::new(bbox, class as i32, max_prob));
            }
        }
    }
}

impl Decode for YoloDecoder<'_> {
    fn check_tensors(&self, tensors: &[TensorView<'_>]) -> DetPostResult<usize> {
        if tensors.is_empty() {
            return Err(DetPostError::MissingInput {
                index: 0,
                len: 0,
                context: "feature layers",
            });
        }
        let mut views = Vec::with_capacity(tensors.len());
        for index in 0..tensors.len() {
            let view = require(tensors, index, Elem::Float, "feature layer")?;
            self.layer_dims(index, view)?;
            views.push((index, view));
        }
        shared_batch(&views)
    }

    fn decode(
        &self,
        tensors: &[TensorView<'_>],
        image: usize,
        resize: &ResizeInfo,
        config: &PostProcessConfig,
    ) -> DetPostResult<Vec<Detection>> {
        let (net_w, net_h) = (resize.width_resize, resize.height_resize);
        let mut cands = self.candidates(tensors, image, net_w, net_h, config)?;
        trace_event!("candidates_decoded", image = image, count = cands.len());

        if self.layout.letterbox {
            let (img_w, img_h, _, _) = resize.image_extent();
            let letterbox = Letterbox::new(net_w, net_h, img_w as u32, img_h as u32)?;
            for cand in cands.iter_mut() {
                cand.bbox = letterbox.undo(&cand.bbox);
            }
        }
        let mapping = ImageMapping::new(resize)?;

        suppress(&mut cands, config.iou_thresh, config.iou_method, config.sort_by);

        Ok(cands
            .iter()
            .map(|c| labeled(mapping.map(&c.bbox), c.class_id, c.confidence, config))
            .collect())
    }
}
