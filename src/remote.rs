//! Shape, texture and background-removal pipelines served by a Hunyuan3D inference
//! service over HTTP.
//!
//! Requests carry images as base64 PNG. Mesh routes answer `{"meshes": [<base64 GLB>, ...]}`,
//! the removal route answers `{"image": <base64 PNG>}`. Calls block until the service
//! answers; no client timeout is applied.

use crate::config::{Config, Flow, GenerationParams, ModelSpec};
use crate::errors::{Hy3dError, Result};
use crate::mesh::Mesh;
use crate::model::OnnxBackgroundRemover;
use crate::traits::{BackgroundRemover, PipelineFactory, ShapeGenerator, TextureGenerator};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageFormat, RgbaImage};
use reqwest::blocking::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ShapeRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    subfolder: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    variant: Option<&'a str>,
    image: String,
    num_inference_steps: u32,
    octree_resolution: u32,
    num_chunks: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    output_type: &'a str,
}

#[derive(Debug, Serialize)]
struct TextureRequest<'a> {
    model: &'a str,
    mesh: String,
    image: String,
}

#[derive(Debug, Serialize)]
struct RemovalRequest {
    image: String,
}

#[derive(Debug, Deserialize)]
struct MeshResponse {
    meshes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    image: String,
}

pub fn encode_png(image: &RgbaImage) -> Result<String> {
    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, ImageFormat::Png)?;
    Ok(STANDARD.encode(png.into_inner()))
}

/// Decode the first candidate only; the rest are never looked at.
fn first_mesh(operation: &str, response: MeshResponse) -> Result<Mesh> {
    let encoded = response
        .meshes
        .into_iter()
        .next()
        .ok_or_else(|| Hy3dError::pipeline(operation, "no mesh candidates returned"))?;
    let glb = STANDARD
        .decode(encoded)
        .map_err(|e| Hy3dError::invalid_mesh(format!("mesh is not valid base64: {e}")))?;
    Mesh::from_glb(glb)
}

fn decode_image(operation: &str, response: ImageResponse) -> Result<RgbaImage> {
    let png = STANDARD
        .decode(response.image)
        .map_err(|e| Hy3dError::pipeline(operation, format!("image is not valid base64: {e}")))?;
    let image = image::load_from_memory(&png).map_err(|e| Hy3dError::ImageProcessing {
        path: "service response".to_string(),
        operation: operation.to_string(),
        source: Box::new(e),
    })?;
    Ok(image.into_rgba8())
}

/// Thin blocking client shared by all pipelines.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    endpoint: String,
    http: Client,
}

impl ServiceClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        let http = Client::builder().timeout(None::<Duration>).build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn url(&self, route: &str) -> String {
        format!("{}/{}", self.endpoint, route.trim_start_matches('/'))
    }

    /// Reachability check standing in for model loading.
    pub fn health(&self) -> Result<()> {
        let response = self.http.get(self.url("health")).send()?;
        check_status("service health check", response).map(drop)
    }

    fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        operation: &str,
        route: &str,
        body: &T,
    ) -> Result<R> {
        let response = self.http.post(self.url(route)).json(body).send()?;
        check_status(operation, response)?
            .json()
            .map_err(|e| Hy3dError::pipeline(operation, format!("malformed response: {e}")))
    }
}

fn check_status(operation: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(Hy3dError::pipeline(
        operation,
        format!("service answered {status}: {}", body.trim()),
    ))
}

#[derive(Debug, Clone)]
pub struct RemoteShapeGenerator {
    client: ServiceClient,
    model: ModelSpec,
}

impl RemoteShapeGenerator {
    pub fn from_pretrained(client: ServiceClient, model: ModelSpec) -> Result<Self> {
        client.health()?;
        tracing::info!(model = %model.id, subfolder = ?model.subfolder, variant = ?model.variant, "shape pipeline ready");
        Ok(Self { client, model })
    }
}

impl ShapeGenerator for RemoteShapeGenerator {
    fn generate(&self, image: &RgbaImage, params: &GenerationParams) -> Result<Mesh> {
        let request = ShapeRequest {
            model: &self.model.id,
            subfolder: self.model.subfolder.as_deref(),
            variant: self.model.variant.as_deref(),
            image: encode_png(image)?,
            num_inference_steps: params.num_inference_steps,
            octree_resolution: params.octree_resolution,
            num_chunks: params.num_chunks,
            seed: params.seed,
            output_type: &params.output_type,
        };
        let response = self.client.post("shape generation", "shape", &request)?;
        first_mesh("shape generation", response)
    }
}

#[derive(Debug, Clone)]
pub struct RemoteTextureGenerator {
    client: ServiceClient,
    model: ModelSpec,
}

impl RemoteTextureGenerator {
    pub fn from_pretrained(client: ServiceClient, model: ModelSpec) -> Result<Self> {
        client.health()?;
        tracing::info!(model = %model.id, "texture pipeline ready");
        Ok(Self { client, model })
    }
}

impl TextureGenerator for RemoteTextureGenerator {
    fn paint(&self, mesh: Mesh, image: &RgbaImage) -> Result<Mesh> {
        let request = TextureRequest {
            model: &self.model.id,
            mesh: STANDARD.encode(mesh.as_bytes()),
            image: encode_png(image)?,
        };
        let response = self.client.post("texture painting", "texture", &request)?;
        first_mesh("texture painting", response).map(Mesh::into_textured)
    }
}

/// Background removal done by the service, used when no local ONNX model is configured.
#[derive(Debug, Clone)]
pub struct RemoteBackgroundRemover {
    client: ServiceClient,
}

impl RemoteBackgroundRemover {
    pub fn connect(client: ServiceClient) -> Result<Self> {
        client.health()?;
        tracing::info!("background removal served remotely");
        Ok(Self { client })
    }
}

impl BackgroundRemover for RemoteBackgroundRemover {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let request = RemovalRequest {
            image: encode_png(image)?,
        };
        let response = self.client.post("background removal", "rembg", &request)?;
        decode_image("background removal", response)
    }
}

/// Local ONNX model when `--remover-model` is given, the service otherwise.
pub enum Remover {
    Onnx(OnnxBackgroundRemover),
    Remote(RemoteBackgroundRemover),
}

impl BackgroundRemover for Remover {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        match self {
            Self::Onnx(remover) => remover.remove_background(image),
            Self::Remote(remover) => remover.remove_background(image),
        }
    }
}

/// Builds the production collaborators.
#[derive(Debug, Clone)]
pub struct RemotePipelineFactory {
    endpoint: String,
    shape_model: ModelSpec,
    texture_model: ModelSpec,
    remover_model: Option<PathBuf>,
    device_id: i32,
}

impl RemotePipelineFactory {
    pub fn new(config: &Config, flow: Flow) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            shape_model: config.shape_model(flow),
            texture_model: config.texture_model(),
            remover_model: config.remover_model.clone(),
            device_id: config.device_id,
        }
    }
}

impl PipelineFactory for RemotePipelineFactory {
    type Remover = Remover;
    type Shape = RemoteShapeGenerator;
    type Texture = RemoteTextureGenerator;

    fn background_remover(&self) -> Result<Self::Remover> {
        match &self.remover_model {
            Some(path) => OnnxBackgroundRemover::new(path, self.device_id).map(Remover::Onnx),
            None => RemoteBackgroundRemover::connect(ServiceClient::new(&self.endpoint)?)
                .map(Remover::Remote),
        }
    }

    fn shape_generator(&self) -> Result<Self::Shape> {
        RemoteShapeGenerator::from_pretrained(
            ServiceClient::new(&self.endpoint)?,
            self.shape_model.clone(),
        )
    }

    fn texture_generator(&self) -> Result<Self::Texture> {
        RemoteTextureGenerator::from_pretrained(
            ServiceClient::new(&self.endpoint)?,
            self.texture_model.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::minimal_glb;
    use image::{Rgb, RgbImage, Rgba};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc::{self, Receiver};
    use std::thread;

    /// Answer one connection per canned `(status, body)` and report each request line.
    fn stub_service(responses: Vec<(u16, String)>) -> (String, Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let request = read_request(&mut stream);
                let _ = tx.send(request);
                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes());
            }
        });

        (endpoint, rx)
    }

    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap_or(0);
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buffer);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buffer.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        let text = String::from_utf8_lossy(&buffer);
        text.lines().next().unwrap_or_default().to_string()
    }

    fn request_lines(rx: &Receiver<String>, expected: usize) -> Vec<String> {
        (0..expected)
            .filter_map(|_| rx.recv_timeout(Duration::from_secs(5)).ok())
            .collect()
    }

    fn meshes_body(glbs: &[Vec<u8>]) -> String {
        serde_json::json!({ "meshes": glbs.iter().map(|g| STANDARD.encode(g)).collect::<Vec<_>>() })
            .to_string()
    }

    fn ok_health() -> (u16, String) {
        (200, "{}".to_string())
    }

    #[test]
    fn test_url_joining() -> Result<()> {
        let client = ServiceClient::new("http://localhost:8081/")?;
        assert_eq!(client.url("/shape"), "http://localhost:8081/shape");
        assert_eq!(client.url("health"), "http://localhost:8081/health");
        Ok(())
    }

    #[test]
    fn test_shape_request_shape() -> Result<()> {
        let params = GenerationParams::default();
        let request = ShapeRequest {
            model: "tencent/Hunyuan3D-2mini",
            subfolder: Some("hunyuan3d-dit-v2-mini"),
            variant: None,
            image: encode_png(&RgbaImage::new(2, 2))?,
            num_inference_steps: params.num_inference_steps,
            octree_resolution: params.octree_resolution,
            num_chunks: params.num_chunks,
            seed: None,
            output_type: &params.output_type,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["num_inference_steps"], 50);
        assert_eq!(json["octree_resolution"], 380);
        assert_eq!(json["num_chunks"], 20000);
        assert_eq!(json["output_type"], "trimesh");
        assert!(json.get("seed").is_none());
        assert!(json.get("variant").is_none());
        Ok(())
    }

    #[test]
    fn test_png_payload_decodes() -> Result<()> {
        let encoded = encode_png(&RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4])))?;
        let bytes = STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes)?.into_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([1, 2, 3, 4]));
        Ok(())
    }

    #[test]
    fn test_first_mesh_ignores_later_candidates() -> Result<()> {
        let response = MeshResponse {
            meshes: vec![
                STANDARD.encode(minimal_glb("{}")),
                STANDARD.encode(b"garbage"),
                "@@not base64@@".to_string(),
            ],
        };
        let mesh = first_mesh("shape generation", response)?;
        assert_eq!(mesh.as_bytes(), minimal_glb("{}").as_slice());
        Ok(())
    }

    #[test]
    fn test_first_mesh_rejects_bad_or_missing_first_candidate() {
        let empty = MeshResponse { meshes: vec![] };
        assert!(matches!(
            first_mesh("shape generation", empty),
            Err(Hy3dError::Pipeline { .. })
        ));

        let bad = MeshResponse {
            meshes: vec![STANDARD.encode(b"not a glb")],
        };
        assert!(matches!(
            first_mesh("shape generation", bad),
            Err(Hy3dError::InvalidMesh { .. })
        ));
    }

    #[test]
    fn test_shape_over_http_takes_first_candidate() -> Result<()> {
        let first = minimal_glb(r#"{"asset":{"version":"2.0"}}"#);
        let (endpoint, rx) = stub_service(vec![
            ok_health(),
            (200, meshes_body(&[first.clone(), b"garbage".to_vec()])),
        ]);

        let shape = RemoteShapeGenerator::from_pretrained(
            ServiceClient::new(&endpoint)?,
            ModelSpec::new("tencent/Hunyuan3D-2"),
        )?;
        let mesh = shape.generate(&RgbaImage::new(4, 4), &GenerationParams::default())?;

        assert_eq!(mesh.as_bytes(), first.as_slice());
        assert_eq!(
            request_lines(&rx, 2),
            vec!["GET /health HTTP/1.1", "POST /shape HTTP/1.1"]
        );
        Ok(())
    }

    #[test]
    fn test_error_status_carries_status_and_body() -> Result<()> {
        let (endpoint, _rx) = stub_service(vec![
            ok_health(),
            (500, "CUDA out of memory".to_string()),
        ]);

        let shape = RemoteShapeGenerator::from_pretrained(
            ServiceClient::new(&endpoint)?,
            ModelSpec::new("tencent/Hunyuan3D-2"),
        )?;
        match shape.generate(&RgbaImage::new(4, 4), &GenerationParams::default()) {
            Err(Hy3dError::Pipeline { operation, message }) => {
                assert_eq!(operation, "shape generation");
                assert!(message.contains("500"), "{message}");
                assert!(message.contains("CUDA out of memory"), "{message}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_construction_fails_when_health_fails() -> Result<()> {
        let (endpoint, _rx) = stub_service(vec![(503, "loading weights".to_string())]);

        let result = RemoteTextureGenerator::from_pretrained(
            ServiceClient::new(&endpoint)?,
            ModelSpec::new("tencent/Hunyuan3D-2"),
        );
        assert!(matches!(result, Err(Hy3dError::Pipeline { .. })));
        Ok(())
    }

    #[test]
    fn test_texture_over_http() -> Result<()> {
        let painted = minimal_glb(r#"{"asset":{"version":"2.0"},"materials":[{}]}"#);
        let (endpoint, rx) = stub_service(vec![
            ok_health(),
            (200, meshes_body(&[painted.clone()])),
            (200, r#"{"meshes":[]}"#.to_string()),
        ]);

        let texture = RemoteTextureGenerator::from_pretrained(
            ServiceClient::new(&endpoint)?,
            ModelSpec::new("tencent/Hunyuan3D-2"),
        )?;
        let image = RgbaImage::new(4, 4);

        let mesh = texture.paint(Mesh::from_glb(minimal_glb("{}"))?, &image)?;
        assert!(mesh.is_textured());
        assert_eq!(mesh.as_bytes(), painted.as_slice());

        let empty = texture.paint(Mesh::from_glb(minimal_glb("{}"))?, &image);
        assert!(matches!(empty, Err(Hy3dError::Pipeline { .. })));
        assert_eq!(request_lines(&rx, 3)[1], "POST /texture HTTP/1.1");
        Ok(())
    }

    #[test]
    fn test_default_config_removes_background_through_service() -> Result<()> {
        let cutout = RgbaImage::from_pixel(6, 4, Rgba([200, 40, 40, 0]));
        let body = serde_json::json!({ "image": encode_png(&cutout)? }).to_string();
        let (endpoint, rx) = stub_service(vec![ok_health(), (200, body)]);

        let config = Config {
            endpoint,
            ..Config::default()
        };
        assert!(config.remover_model.is_none());

        let remover = RemotePipelineFactory::new(&config, Flow::Single).background_remover()?;
        assert!(matches!(remover, Remover::Remote(_)));

        let rgb = image::DynamicImage::ImageRgb8(RgbImage::from_pixel(6, 4, Rgb([200, 40, 40])));
        let output = remover.remove_background(&rgb.into_rgba8())?;

        assert_eq!(output, cutout);
        assert_eq!(
            request_lines(&rx, 2),
            vec!["GET /health HTTP/1.1", "POST /rembg HTTP/1.1"]
        );
        Ok(())
    }

    #[test]
    fn test_local_model_path_selects_onnx_remover() {
        let config = Config {
            remover_model: Some(PathBuf::from("/nonexistent/isnet.onnx")),
            ..Config::default()
        };
        let result = RemotePipelineFactory::new(&config, Flow::Single).background_remover();
        assert!(matches!(result, Err(Hy3dError::FileSystem { .. })));
    }
}
