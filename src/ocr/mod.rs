//! Screenshot to [`ExtractedRecord`].
//!
//! [`Extractor`] crops the panel, runs OCR, and resolves each field by
//! walking its configured [`Strategy`] list. Every (region, method) pair is
//! recognized at most once per capture.

pub mod control_bar;
pub mod engine;
pub mod preprocess;
pub mod region;
pub mod setup;
pub mod strategy;

use anyhow::Result;
use image::RgbaImage;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::capture::{CaptureError, Screenshot};
use crate::config::{OcrConfig, PipelineConfig, PreprocessConfig, RegionConfig};
use crate::parser::{PanelParser, ParseMode, ParsedPanel};
use crate::record::{Diagnostics, ExtractedRecord, FieldKind, PanelLayout, SystemStatus};
use engine::{OcrEngine, OcrRequest};
use preprocess::preprocess;
use strategy::{Strategy, StrategyPlan, StrategySource};

/// A finished extraction: the record plus the panel crop it came from.
pub struct Extraction {
    pub record: ExtractedRecord,
    pub panel: RgbaImage,
}

/// Fields resolved for each layout.
fn fields_for(layout: PanelLayout) -> &'static [FieldKind] {
    match layout {
        PanelLayout::Standard => &[FieldKind::Name, FieldKind::Status, FieldKind::Faction, FieldKind::Scores],
        PanelLayout::Competitive => &[FieldKind::Name, FieldKind::Status, FieldKind::Ranking],
    }
}

pub struct Extractor<E: OcrEngine> {
    engine: E,
    parser: PanelParser,
    ocr: OcrConfig,
    regions: RegionConfig,
    preprocessing: PreprocessConfig,
    strategies: StrategyPlan,
}

impl<E: OcrEngine> Extractor<E> {
    pub fn new(engine: E, config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            engine,
            parser: PanelParser::new(config.parsing.clone())?,
            ocr: config.ocr.clone(),
            regions: config.regions.clone(),
            preprocessing: config.preprocessing.clone(),
            strategies: config.strategies.clone(),
        })
    }

    pub fn parser(&self) -> &PanelParser {
        &self.parser
    }

    /// Extracts one record from a screenshot.
    ///
    /// Missing fields are not errors; only an empty crop or a failing
    /// primary OCR pass abandons the capture.
    pub fn extract(&self, shot: &Screenshot) -> Result<Extraction, CaptureError> {
        if shot.width == 0 || shot.height == 0 {
            return Err(CaptureError::EmptyRegion("screenshot".to_string()));
        }
        let primary = Strategy::panel(self.preprocessing.primary_method);

        // The competitive crop is the taller one, so it covers both layouts
        let tall = region::crop_panel(&shot.image, PanelLayout::Competitive, &self.regions);
        if region::is_empty(&tall) {
            return Err(CaptureError::EmptyRegion("panel".to_string()));
        }
        let mut detect = PanelOcr::new(self, tall, PanelLayout::Competitive);
        let detect_text = detect.text(&primary).ok_or_else(|| primary_failure(&primary))?;
        let layout = self.parser.parse(&detect_text, ParseMode::Panel).layout();
        debug!("Detected {:?} layout", layout);

        let mut ocr = match layout {
            PanelLayout::Competitive => detect,
            PanelLayout::Standard => {
                let panel = region::crop_panel(&shot.image, PanelLayout::Standard, &self.regions);
                if region::is_empty(&panel) {
                    return Err(CaptureError::EmptyRegion("standard panel".to_string()));
                }
                PanelOcr::new(self, panel, PanelLayout::Standard)
            }
        };
        let raw_text = ocr.text(&primary).ok_or_else(|| primary_failure(&primary))?;

        let mut merged = ParsedPanel {
            details: self.parser.parse(&raw_text, ParseMode::Panel).details,
            ..Default::default()
        };
        let mut diagnostics = Diagnostics {
            raw_text,
            ..Default::default()
        };

        for &field in fields_for(layout) {
            let mut sources = Vec::new();
            for candidate in self.strategies.for_field(field) {
                let Some(text) = ocr.text(candidate) else {
                    continue;
                };
                let mode = match candidate.source {
                    StrategySource::Panel => ParseMode::Panel,
                    StrategySource::Subsection { .. } => ParseMode::Subsection,
                };
                let mut parsed = self.parser.parse(&text, mode);
                if merged.merge_field(&mut parsed, field) {
                    sources.push(candidate.label());
                }
                if merged.is_complete(field) {
                    debug!("{} resolved by {}", field, candidate);
                    break;
                }
            }

            match merged.provenance(field, &sources.join(" + ")) {
                Some(provenance) => {
                    if !merged.is_complete(field) {
                        debug!("{} only partly found", field);
                    }
                    diagnostics.fields.insert(field, provenance);
                }
                None => debug!("{} not found by any strategy", field),
            }
        }

        if layout == PanelLayout::Standard {
            merged.ranking = None;
        }
        let mut record = merged.into_record(diagnostics);

        if layout == PanelLayout::Standard {
            let initial = control_bar::initial_control_points(&ocr.panel, &self.regions);
            if let (Some(points), Some(status)) = (initial, record.status()) {
                let implied = SystemStatus::from_control_points(points);
                if implied != status {
                    warn!(
                        "{}: status {} but status bar marker suggests {} ({} CP)",
                        record.system_name(),
                        status,
                        implied,
                        points
                    );
                }
            }
            record = record.with_initial_control_points(initial);
        }

        Ok(Extraction {
            record,
            panel: ocr.panel,
        })
    }
}

fn primary_failure(primary: &Strategy) -> CaptureError {
    CaptureError::Ocr(format!("primary pass {} produced no text", primary))
}

/// OCR results for one panel crop, cached per strategy.
struct PanelOcr<'a, E: OcrEngine> {
    extractor: &'a Extractor<E>,
    panel: RgbaImage,
    layout: PanelLayout,
    cache: HashMap<Strategy, Option<String>>,
}

impl<'a, E: OcrEngine> PanelOcr<'a, E> {
    fn new(extractor: &'a Extractor<E>, panel: RgbaImage, layout: PanelLayout) -> Self {
        Self {
            extractor,
            panel,
            layout,
            cache: HashMap::new(),
        }
    }

    /// Text for `strategy`, or `None` when its region does not exist for
    /// this layout, is empty, or the engine failed on it.
    fn text(&mut self, strategy: &Strategy) -> Option<String> {
        if let Some(cached) = self.cache.get(strategy) {
            return cached.clone();
        }
        let result = self.recognize(strategy);
        self.cache.insert(strategy.clone(), result.clone());
        result
    }

    fn recognize(&self, strategy: &Strategy) -> Option<String> {
        let ex = self.extractor;
        let (crop, psm) = match &strategy.source {
            StrategySource::Panel => (self.panel.clone(), ex.ocr.panel_psm),
            StrategySource::Subsection { section } => (
                region::crop_subsection(&self.panel, self.layout, &ex.regions, section)?,
                ex.ocr.subsection_psm,
            ),
        };
        if region::is_empty(&crop) {
            debug!("Skipping {}: empty region", strategy);
            return None;
        }

        let image = preprocess(&crop, strategy.method, &ex.preprocessing);
        let request = OcrRequest {
            engine_mode: ex.ocr.engine_mode,
            page_segmentation: psm,
        };
        match ex.engine.recognize(&image, request) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("OCR failed for {}: {:#}", strategy, e);
                None
            }
        }
    }
}
