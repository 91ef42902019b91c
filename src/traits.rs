use crate::config::GenerationParams;
use crate::errors::Result;
use crate::mesh::Mesh;
use image::RgbaImage;
use std::path::PathBuf;

/// ファイル選択の結果
///
/// キャンセルはエラーではなく、呼び出し側が終了するか再度尋ねるかを決める
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Chosen(PathBuf),
    Cancelled,
}

/// 入力画像の選択を抽象化
pub trait FileSelector {
    fn select(&mut self) -> Result<Selection>;
}

/// 背景除去コンポーネントの抽象化
///
/// 返される画像は必ずアルファチャンネルを持つ
pub trait BackgroundRemover {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage>;
}

/// 形状生成パイプライン（画像 → メッシュ候補）
pub trait ShapeGenerator {
    /// パイプラインが返す候補のうち先頭のメッシュを返す（候補が無ければエラー）
    fn generate(&self, image: &RgbaImage, params: &GenerationParams) -> Result<Mesh>;
}

/// テクスチャ生成パイプライン（メッシュ + 参照画像 → テクスチャ付きメッシュ）
pub trait TextureGenerator {
    fn paint(&self, mesh: Mesh, image: &RgbaImage) -> Result<Mesh>;
}

/// パイプラインの構築を抽象化
///
/// 構築はモデルの読み込みを伴うため高コスト。セッションが一度だけ呼び出す
pub trait PipelineFactory {
    type Remover: BackgroundRemover + 'static;
    type Shape: ShapeGenerator;
    type Texture: TextureGenerator;

    fn background_remover(&self) -> Result<Self::Remover>;
    fn shape_generator(&self) -> Result<Self::Shape>;
    fn texture_generator(&self) -> Result<Self::Texture>;
}
