use crate::config::GenerationParams;
use crate::errors::{Hy3dError, Result};
use crate::mesh::{minimal_glb, Mesh};
use crate::traits::{
    BackgroundRemover, FileSelector, PipelineFactory, Selection, ShapeGenerator, TextureGenerator,
};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

/// 呼び出し順を記録する共有ログ
///
/// モック同士で共有し、構築回数や処理順序をテストで検証する
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }
}

/// あらかじめ決めた選択結果を順に返すセレクター
#[derive(Debug)]
pub struct MockSelector {
    selections: VecDeque<Selection>,
    log: CallLog,
}

impl MockSelector {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>, log: CallLog) -> Self {
        let mut selections: VecDeque<_> = paths.into_iter().map(Selection::Chosen).collect();
        selections.push_back(Selection::Cancelled);
        Self { selections, log }
    }

    pub fn cancelled(log: CallLog) -> Self {
        Self::new(Vec::new(), log)
    }
}

impl FileSelector for MockSelector {
    fn select(&mut self) -> Result<Selection> {
        self.log.record("select");
        Ok(self.selections.pop_front().unwrap_or(Selection::Cancelled))
    }
}

/// テスト用の背景除去：全画素を透明にする
#[derive(Debug, Clone)]
pub struct MockBackgroundRemover {
    log: CallLog,
}

impl MockBackgroundRemover {
    pub const fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl BackgroundRemover for MockBackgroundRemover {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        self.log.record("remove_background");
        let mut output = image.clone();
        for Rgba([_, _, _, alpha]) in output.pixels_mut() {
            *alpha = 0;
        }
        Ok(output)
    }
}

#[derive(Debug, Clone)]
pub struct MockShapeGenerator {
    log: CallLog,
    candidates: usize,
    params: Arc<Mutex<Vec<GenerationParams>>>,
}

impl MockShapeGenerator {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            candidates: 2,
            params: Arc::default(),
        }
    }

    /// 候補数を変更（0 で空の結果）
    pub fn with_candidates(mut self, candidates: usize) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn received_params(&self) -> Vec<GenerationParams> {
        self.params.lock().clone()
    }
}

impl ShapeGenerator for MockShapeGenerator {
    fn generate(&self, image: &RgbaImage, params: &GenerationParams) -> Result<Mesh> {
        self.log.record("generate_shape");
        self.params.lock().push(params.clone());
        if self.candidates == 0 {
            return Err(Hy3dError::pipeline("shape generation", "no mesh candidates returned"));
        }
        // 先頭の候補のみ返す
        Mesh::from_glb(minimal_glb(&format!(
            r#"{{"asset":{{"version":"2.0"}},"extras":{{"candidate":0,"of":{},"width":{}}}}}"#,
            self.candidates,
            image.width()
        )))
    }
}

#[derive(Debug, Clone)]
pub struct MockTextureGenerator {
    log: CallLog,
    fail: bool,
}

impl MockTextureGenerator {
    pub const fn new(log: CallLog) -> Self {
        Self { log, fail: false }
    }

    pub const fn failing(log: CallLog) -> Self {
        Self { log, fail: true }
    }
}

impl TextureGenerator for MockTextureGenerator {
    fn paint(&self, mesh: Mesh, _image: &RgbaImage) -> Result<Mesh> {
        self.log.record("paint_texture");
        if self.fail {
            return Err(Hy3dError::pipeline("texture painting", "mock failure"));
        }
        Ok(mesh.into_textured())
    }
}

/// 構築回数を記録するファクトリー
#[derive(Debug, Clone)]
pub struct MockPipelineFactory {
    pub log: CallLog,
    shape: MockShapeGenerator,
    failing_texture: bool,
}

impl MockPipelineFactory {
    pub fn new(log: CallLog) -> Self {
        Self {
            shape: MockShapeGenerator::new(log.clone()),
            log,
            failing_texture: false,
        }
    }

    pub fn with_shape_generator(mut self, shape: MockShapeGenerator) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_failing_texture(mut self) -> Self {
        self.failing_texture = true;
        self
    }
}

impl PipelineFactory for MockPipelineFactory {
    type Remover = MockBackgroundRemover;
    type Shape = MockShapeGenerator;
    type Texture = MockTextureGenerator;

    fn background_remover(&self) -> Result<Self::Remover> {
        self.log.record("load_background_remover");
        Ok(MockBackgroundRemover::new(self.log.clone()))
    }

    fn shape_generator(&self) -> Result<Self::Shape> {
        self.log.record("load_shape_pipeline");
        Ok(self.shape.clone())
    }

    fn texture_generator(&self) -> Result<Self::Texture> {
        self.log.record("load_texture_pipeline");
        Ok(if self.failing_texture {
            MockTextureGenerator::failing(self.log.clone())
        } else {
            MockTextureGenerator::new(self.log.clone())
        })
    }
}
