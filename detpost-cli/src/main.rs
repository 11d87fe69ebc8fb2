use clap::Parser;
use detpost::{
    process, process_par, BoxDecoding, CornerBox, Detection, FpnLayout, GridLayout,
    IouMethod, MindsporeLayout, MindsporeMaskLayout, ModelLayout, ModelLayoutDescriptor,
    OriginalLayout, PostProcessConfig, PrecutLayout, ResizeInfo, ResizeMode, SortCriterion,
    TensorData, TensorView, YoloLayout,
};
use half::f16;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "detpost CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum IouMethodConfig {
    #[default]
    Union,
    Min,
    Max,
    Diou,
}

impl From<IouMethodConfig> for IouMethod {
    fn from(value: IouMethodConfig) -> Self {
        match value {
            IouMethodConfig::Union => IouMethod::Union,
            IouMethodConfig::Min => IouMethod::Min,
            IouMethodConfig::Max => IouMethod::Max,
            IouMethodConfig::Diou => IouMethod::Diou,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SortConfig {
    #[default]
    ByConfidence,
    ByArea,
}

impl From<SortConfig> for SortCriterion {
    fn from(value: SortConfig) -> Self {
        match value {
            SortConfig::ByConfidence => SortCriterion::ByConfidence,
            SortConfig::ByArea => SortCriterion::ByArea,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PostProcessJson {
    score_thresh: f32,
    separate_score_thresh: Vec<f32>,
    iou_thresh: f32,
    iou_method: IouMethodConfig,
    sort_by: SortConfig,
    class_names: Vec<String>,
}

impl Default for PostProcessJson {
    fn default() -> Self {
        let cfg = PostProcessConfig::default();
        Self {
            score_thresh: cfg.score_thresh,
            separate_score_thresh: cfg.separate_score_thresh,
            iou_thresh: cfg.iou_thresh,
            iou_method: IouMethodConfig::Union,
            sort_by: SortConfig::ByConfidence,
            class_names: cfg.class_names,
        }
    }
}

impl From<PostProcessJson> for PostProcessConfig {
    fn from(value: PostProcessJson) -> Self {
        Self {
            score_thresh: value.score_thresh,
            separate_score_thresh: value.separate_score_thresh,
            iou_thresh: value.iou_thresh,
            iou_method: value.iou_method.into(),
            sort_by: value.sort_by.into(),
            class_names: value.class_names,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct OriginalJson {
    object_num_tensor: usize,
    confidence_tensor: usize,
    bbox_tensor: usize,
    class_id_tensor: usize,
}

impl Default for OriginalJson {
    fn default() -> Self {
        let l = OriginalLayout::default();
        Self {
            object_num_tensor: l.object_num_tensor,
            confidence_tensor: l.confidence_tensor,
            bbox_tensor: l.bbox_tensor,
            class_id_tensor: l.class_id_tensor,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PrecutJson {
    object_num_tensor: usize,
    bbox_tensor: usize,
    confidence_tensor: usize,
}

impl Default for PrecutJson {
    fn default() -> Self {
        let l = PrecutLayout::default();
        Self {
            object_num_tensor: l.object_num_tensor,
            bbox_tensor: l.bbox_tensor,
            confidence_tensor: l.confidence_tensor,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct FpnJson {
    bbox_tensor: usize,
    class_id_tensor: usize,
}

impl Default for FpnJson {
    fn default() -> Self {
        let l = FpnLayout::default();
        Self {
            bbox_tensor: l.bbox_tensor,
            class_id_tensor: l.class_id_tensor,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct MindsporeJson {
    rpn_max_num: usize,
    max_per_img: usize,
    mask_size: usize,
    mask_thresh: f32,
}

impl Default for MindsporeJson {
    fn default() -> Self {
        let l = MindsporeMaskLayout::default();
        Self {
            rpn_max_num: l.base.rpn_max_num,
            max_per_img: l.base.max_per_img,
            mask_size: l.mask_size,
            mask_thresh: l.mask_thresh,
        }
    }
}

impl MindsporeJson {
    fn base(&self) -> MindsporeLayout {
        MindsporeLayout {
            rpn_max_num: self.rpn_max_num,
            max_per_img: self.max_per_img,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum GridLayoutConfig {
    Nhwc,
    Nchw,
    Nchwc,
}

impl From<GridLayoutConfig> for GridLayout {
    fn from(value: GridLayoutConfig) -> Self {
        match value {
            GridLayoutConfig::Nhwc => GridLayout::Nhwc,
            GridLayoutConfig::Nchw => GridLayout::Nchw,
            GridLayoutConfig::Nchwc => GridLayout::Nchwc,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BoxDecodingConfig {
    Exponential,
    Quadratic,
}

impl From<BoxDecodingConfig> for BoxDecoding {
    fn from(value: BoxDecodingConfig) -> Self {
        match value {
            BoxDecodingConfig::Exponential => BoxDecoding::Exponential,
            BoxDecodingConfig::Quadratic => BoxDecoding::Quadratic,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct YoloJson {
    anchors: Vec<f32>,
    anchor_dim: usize,
    objectness_thresh: f32,
    letterbox: bool,
    grid_layout: GridLayoutConfig,
    box_decoding: BoxDecodingConfig,
}

impl Default for YoloJson {
    fn default() -> Self {
        let l = YoloLayout::default();
        Self {
            anchors: l.anchors,
            anchor_dim: l.anchor_dim,
            objectness_thresh: l.objectness_thresh,
            letterbox: l.letterbox,
            grid_layout: GridLayoutConfig::Nchwc,
            box_decoding: BoxDecodingConfig::Quadratic,
        }
    }
}

impl From<YoloJson> for YoloLayout {
    fn from(value: YoloJson) -> Self {
        Self {
            anchors: value.anchors,
            anchor_dim: value.anchor_dim,
            objectness_thresh: value.objectness_thresh,
            letterbox: value.letterbox,
            grid_layout: value.grid_layout.into(),
            box_decoding: value.box_decoding.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum LayoutConfig {
    Original(OriginalJson),
    NmsPrecut(PrecutJson),
    Fpn(FpnJson),
    MindsporeNms(MindsporeJson),
    MindsporeMask(MindsporeJson),
    YoloAnchor(YoloJson),
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig::YoloAnchor(YoloJson::default())
    }
}

impl From<LayoutConfig> for ModelLayout {
    fn from(value: LayoutConfig) -> Self {
        match value {
            LayoutConfig::Original(l) => ModelLayout::Original(OriginalLayout {
                object_num_tensor: l.object_num_tensor,
                confidence_tensor: l.confidence_tensor,
                bbox_tensor: l.bbox_tensor,
                class_id_tensor: l.class_id_tensor,
            }),
            LayoutConfig::NmsPrecut(l) => ModelLayout::NmsPrecut(PrecutLayout {
                object_num_tensor: l.object_num_tensor,
                bbox_tensor: l.bbox_tensor,
                confidence_tensor: l.confidence_tensor,
            }),
            LayoutConfig::Fpn(l) => ModelLayout::Fpn(FpnLayout {
                bbox_tensor: l.bbox_tensor,
                class_id_tensor: l.class_id_tensor,
            }),
            LayoutConfig::MindsporeNms(l) => ModelLayout::MindsporeNms(l.base()),
            LayoutConfig::MindsporeMask(l) => ModelLayout::MindsporeMask(MindsporeMaskLayout {
                base: l.base(),
                mask_size: l.mask_size,
                mask_thresh: l.mask_thresh,
            }),
            LayoutConfig::YoloAnchor(l) => ModelLayout::YoloAnchor(l.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    input_path: String,
    output_path: Option<String>,
    class_num: usize,
    parallel: bool,
    layout: LayoutConfig,
    postprocess: PostProcessJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: String::new(),
            output_path: None,
            class_num: 80,
            parallel: false,
            layout: LayoutConfig::default(),
            postprocess: PostProcessJson::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum DTypeConfig {
    F32,
    F16,
    I32,
    I64,
    Bool,
}

#[derive(Debug, Deserialize)]
struct TensorJson {
    dtype: DTypeConfig,
    shape: Vec<usize>,
    data: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ResizeJson {
    width_resize: u32,
    height_resize: u32,
    width_original: u32,
    height_original: u32,
    #[serde(default)]
    keep_aspect_scaling: Option<f32>,
    #[serde(default)]
    crop: Option<[f32; 4]>,
}

impl From<&ResizeJson> for ResizeInfo {
    fn from(value: &ResizeJson) -> Self {
        let mut info = ResizeInfo::new(
            value.width_resize,
            value.height_resize,
            value.width_original,
            value.height_original,
        );
        if let Some(scaling) = value.keep_aspect_scaling {
            info = info.with_resize_mode(ResizeMode::KeepAspectRatio { scaling });
        }
        if let Some([x0, y0, x1, y1]) = value.crop {
            info = info.with_crop(CornerBox::new(x0, y0, x1, y1));
        }
        info
    }
}

#[derive(Debug, Deserialize)]
struct InputJson {
    tensors: Vec<TensorJson>,
    resize_infos: Vec<ResizeJson>,
}

/// Owned tensor storage that [`TensorView`]s borrow from.
enum Storage {
    F32(Vec<f32>),
    F16(Vec<f16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
}

impl Storage {
    fn from_json(tensor: &TensorJson) -> Self {
        let values = tensor.data.iter().copied();
        match tensor.dtype {
            DTypeConfig::F32 => Storage::F32(values.map(|v| v as f32).collect()),
            DTypeConfig::F16 => Storage::F16(values.map(f16::from_f64).collect()),
            DTypeConfig::I32 => Storage::I32(values.map(|v| v as i32).collect()),
            DTypeConfig::I64 => Storage::I64(values.map(|v| v as i64).collect()),
            DTypeConfig::Bool => Storage::Bool(values.map(|v| v != 0.0).collect()),
        }
    }

    fn data(&self) -> TensorData<'_> {
        match self {
            Storage::F32(d) => TensorData::F32(d),
            Storage::F16(d) => TensorData::F16(d),
            Storage::I32(d) => TensorData::I32(d),
            Storage::I64(d) => TensorData::I64(d),
            Storage::Bool(d) => TensorData::Bool(d),
        }
    }
}

#[derive(Debug, Serialize)]
struct MaskRecord {
    width: usize,
    height: usize,
    rows: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DetectionRecord {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    class_id: i32,
    confidence: f32,
    class_name: Option<String>,
    mask: Option<MaskRecord>,
}

impl From<Detection> for DetectionRecord {
    fn from(value: Detection) -> Self {
        let mask = value.mask.map(|m| MaskRecord {
            width: m.width(),
            height: m.height(),
            rows: m
                .rows()
                .map(|row| row.iter().map(|&v| if v { '1' } else { '0' }).collect())
                .collect(),
        });
        Self {
            x0: value.bbox.x0,
            y0: value.bbox.y0,
            x1: value.bbox.x1,
            y1: value.bbox.y1,
            class_id: value.class_id,
            confidence: value.confidence,
            class_name: value.class_name,
            mask,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env()
                    .add_directive("detpost=info".parse()?)
                    .add_directive("detpost_cli=info".parse()?),
            )
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.input_path.is_empty() {
        return Err("input_path must be set in the config".into());
    }

    let input_text = fs::read_to_string(&config.input_path)?;
    let input: InputJson = serde_json::from_str(&input_text)?;
    let storage: Vec<Storage> = input.tensors.iter().map(Storage::from_json).collect();
    let tensors = storage
        .iter()
        .zip(&input.tensors)
        .map(|(s, t)| TensorView::new(s.data(), &t.shape))
        .collect::<Result<Vec<_>, _>>()?;
    let resize_infos: Vec<ResizeInfo> = input.resize_infos.iter().map(ResizeInfo::from).collect();

    let descriptor = ModelLayoutDescriptor::new(config.class_num, config.layout.into());
    let post: PostProcessConfig = config.postprocess.into();
    let batch = if config.parallel {
        process_par(&tensors, &resize_infos, &descriptor, &post)?
    } else {
        process(&tensors, &resize_infos, &descriptor, &post)?
    };
    tracing::info!(
        images = batch.len(),
        detections = batch.iter().map(Vec::len).sum::<usize>(),
        "post-processing finished"
    );

    let output: Vec<Vec<DetectionRecord>> = batch
        .into_iter()
        .map(|dets| dets.into_iter().map(DetectionRecord::from).collect())
        .collect();
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
