//! CLI 모듈
//!
//! entity-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::collector::DocumentCollector;
use crate::config::{get_data_dir, RagConfig, CONFIG_FILE_NAME};
use crate::embedding::{has_api_key, GeminiEmbedding, TaskType};
use crate::knowledge::{LanceVectorStore, VectorSearchClient};
use crate::retrieval::{RetrievalMethod, RetrievalOptions, RetrievalPipeline};
use crate::web::{PageFetcher, WebSearchClient, WebSearchRegistry};

/// LanceDB 디렉토리 이름 (데이터 디렉토리 하위)
const VECTORS_DIR: &str = "vectors";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "entity-rag")]
#[command(version, about = "엔티티 인식 RAG 검색 파이프라인", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 지식베이스 검색 (엔티티 확장 + 웹 보강)
    Query {
        /// 검색 쿼리
        query: String,

        /// 초기 벡터 검색 결과 수
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,

        /// 엔티티 확장 깊이
        #[arg(short, long, default_value = "2")]
        depth: usize,

        /// 엔티티 확장 검색 끄기
        #[arg(long)]
        no_entities: bool,

        /// 컨텍스트에 포함할 최대 청크 수
        #[arg(long, default_value = "15")]
        max_results: usize,

        /// 컨텍스트 최대 길이 (문자)
        #[arg(long, default_value = "6000")]
        max_context: usize,

        /// 웹 검색 보강 끄기
        #[arg(long)]
        no_web: bool,

        /// 결과를 JSON으로 출력
        #[arg(long)]
        json: bool,

        /// 전체 요청 제한 시간 (초)
        #[arg(long, default_value = "60")]
        timeout_secs: u64,
    },

    /// 텍스트, 파일, 폴더, 또는 URL을 지식베이스에 추가
    Ingest {
        /// 직접 입력할 텍스트
        #[arg(short, long)]
        text: Option<String>,

        /// 수집할 파일 경로
        #[arg(long)]
        file: Option<PathBuf>,

        /// 수집할 폴더 경로 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 수집할 URL
        #[arg(short, long)]
        url: Option<String>,

        /// 문서 제목
        #[arg(long)]
        title: Option<String>,
    },

    /// 웹 검색 결과를 지식베이스에 저장 (--yes일 때만 저장)
    WebStore {
        /// 검색 쿼리
        query: String,

        /// 검색 결과 수
        #[arg(short, long, default_value = "5")]
        num_results: usize,

        /// 저장 확인
        #[arg(short, long)]
        yes: bool,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = RagConfig::load().context("설정 파일 로드 실패")?;

    match cli.command {
        Commands::Query {
            query,
            top_k,
            depth,
            no_entities,
            max_results,
            max_context,
            no_web,
            json,
            timeout_secs,
        } => {
            let options = RetrievalOptions {
                top_k,
                entity_depth: depth,
                use_entity_enhancement: !no_entities,
                max_results,
                max_context_length: max_context,
                use_web_search: !no_web,
            };
            cmd_query(&config, &query, &options, json, Duration::from_secs(timeout_secs)).await
        }
        Commands::Ingest {
            text,
            file,
            dir,
            url,
            title,
        } => cmd_ingest(&config, text, file, dir, url, title).await,
        Commands::WebStore {
            query,
            num_results,
            yes,
        } => cmd_web_store(&config, &query, num_results, yes).await,
        Commands::Status => cmd_status(&config).await,
    }
}

/// API 키 확인
fn require_api_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }
    Ok(())
}

/// 벡터 저장소 클라이언트 열기
async fn open_vectors(config: &RagConfig) -> Result<VectorSearchClient> {
    let path = get_data_dir().join(VECTORS_DIR);
    let store = LanceVectorStore::open(&path)
        .await
        .context("LanceDB 열기 실패")?;

    Ok(VectorSearchClient::new(
        Arc::new(store),
        config.store.index_name.clone(),
    ))
}

/// 파이프라인 구성 (협력자는 여기서 한 번만 생성)
async fn open_pipeline(config: &RagConfig) -> Result<RetrievalPipeline> {
    require_api_key()?;

    let embedder = GeminiEmbedding::from_env_with_dimension(config.store.dimension)
        .context("임베딩 프로바이더 초기화 실패")?;
    let query_embedder = embedder.for_task(TaskType::RetrievalQuery);

    let vectors = open_vectors(config).await?;
    vectors.ensure_index(config.store.dimension).await?;

    let registry = WebSearchRegistry::from_env();
    let web = match WebSearchClient::resolve(&registry, &config.web.provider) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!("웹 검색 비활성화: {}", e);
            None
        }
    };

    Ok(
        RetrievalPipeline::new(Arc::new(embedder), vectors, web, config)
            .with_query_embedder(Arc::new(query_embedder)),
    )
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 검색 명령어 (query)
async fn cmd_query(
    config: &RagConfig,
    query: &str,
    options: &RetrievalOptions,
    json: bool,
    deadline: Duration,
) -> Result<()> {
    let pipeline = open_pipeline(config).await?;

    if !json {
        println!("[*] 검색 중: \"{}\"", query);
    }

    let result = pipeline
        .retrieve_with_deadline(query, options, deadline)
        .await
        .context("검색 실패")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("JSON 직렬화 실패")?
        );
        return Ok(());
    }

    if !result.entities.is_empty() {
        println!("[*] 엔티티: {}", result.entities.join(", "));
    }
    if result.web_search_used {
        let count = result.web_search_results.as_ref().map_or(0, |r| r.len());
        println!("[*] 웹 검색 사용: {} 건 저장 후 재검색", count);
    }

    if result.sources.is_empty() {
        println!("\n[!] {}", result.relevant_context);
        return Ok(());
    }

    println!("\n[OK] 출처 ({} 건):\n", result.sources.len());

    for (i, source) in result.sources.iter().enumerate() {
        let method_str = match source.retrieval_method {
            Some(RetrievalMethod::VectorSimilarity) => "VEC",
            Some(RetrievalMethod::EntitySearch) => "ENT",
            None => "ERR",
        };

        println!(
            "{}. [{}] [점수: {:.4}] {}",
            i + 1,
            method_str,
            source.score,
            source.id
        );

        if let Some(title) = source.metadata.get("title").and_then(|v| v.as_str()) {
            println!("   제목: {}", title);
        }
        if let Some(url) = source.metadata.get("url").and_then(|v| v.as_str()) {
            println!("   URL: {}", url);
        }
        println!("   내용: {}", truncate_text(&source.text, 200));
        println!();
    }

    if !result.entity_path.is_empty() {
        println!("[*] 엔티티 확장 경로:");
        for step in &result.entity_path {
            println!("   {} <- '{}' ({:.4})", step.id, step.entity, step.score);
        }
        println!();
    }

    println!("---- 컨텍스트 ({} 자) ----", result.relevant_context.chars().count());
    println!("{}", result.relevant_context);

    Ok(())
}

/// 문서 수집 명령어 (ingest)
async fn cmd_ingest(
    config: &RagConfig,
    text: Option<String>,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    url: Option<String>,
    title: Option<String>,
) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let ingestor = pipeline.ingestor();
    let collector = DocumentCollector::with_defaults();

    if let Some(ref dir_path) = dir {
        let files = collector.collect_directory(dir_path)?;
        if files.is_empty() {
            println!("[!] 수집할 파일이 없습니다.");
            return Ok(());
        }

        println!("[*] 수집 대상: {} 파일", files.len());

        let mut success_count = 0;
        let mut error_count = 0;
        let mut total_bytes = 0u64;

        for (i, path) in files.iter().enumerate() {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown");
            print!("[{}/{}] {}... ", i + 1, files.len(), file_name);

            let doc = match collector.read_document(path) {
                Ok(Some(doc)) => doc,
                Ok(None) => {
                    println!("건너뜀");
                    continue;
                }
                Err(e) => {
                    println!("실패: {}", e);
                    error_count += 1;
                    continue;
                }
            };

            match ingestor
                .ingest(&doc.source(), Some(doc.title.as_str()), &doc.content)
                .await
            {
                Ok(report) => {
                    println!("완료 ({} 청크)", report.chunk_count);
                    total_bytes += doc.size;
                    success_count += 1;
                }
                Err(e) => {
                    println!("저장 실패: {}", e);
                    error_count += 1;
                }
            }
        }

        println!();
        println!(
            "[OK] 완료: 성공 {}, 실패 {} ({})",
            success_count,
            error_count,
            format_bytes(total_bytes as usize)
        );
        return Ok(());
    }

    let (source, doc_title, content) = if let Some(ref file_path) = file {
        match collector.read_document(file_path)? {
            Some(doc) => (doc.source(), title.or(Some(doc.title)), doc.content),
            None => {
                println!("[!] 지원하지 않는 파일 형식: {:?}", file_path);
                return Ok(());
            }
        }
    } else if let Some(ref url_str) = url {
        println!("[*] URL 가져오는 중: {}", url_str);

        let fetcher = PageFetcher::new().context("PageFetcher 생성 실패")?;
        let page = fetcher.fetch(url_str).await.context("URL 가져오기 실패")?;

        (page.url, title.or(page.title), page.content)
    } else if let Some(text_content) = text {
        ("direct-input".to_string(), title, text_content)
    } else {
        bail!("--text, --file, --dir, --url 중 하나를 지정해야 합니다");
    };

    println!("[*] 청킹 및 임베딩 생성 중...");

    let report = ingestor
        .ingest(&source, doc_title.as_deref(), &content)
        .await
        .context("문서 추가 실패")?;

    println!("[OK] 문서가 추가되었습니다 ({} 청크)", report.chunk_count);
    println!("     출처: {}", report.source);

    Ok(())
}

/// 웹 검색 결과 저장 명령어 (web-store)
async fn cmd_web_store(config: &RagConfig, query: &str, num_results: usize, yes: bool) -> Result<()> {
    let pipeline = open_pipeline(config).await?;

    println!("[*] 웹 검색 중: \"{}\"", query);

    let (results, report) = pipeline
        .search_and_store(query, num_results, yes)
        .await
        .context("웹 검색 실패")?;

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());
    for (i, result) in results.iter().enumerate() {
        println!("{}. {}", i + 1, result.title);
        println!("   URL: {}", result.url);
        println!("   스니펫: {}", truncate_text(&result.snippet, 200));
        println!();
    }

    if yes {
        println!("[OK] {}", report.message);
        for id in &report.document_ids {
            println!("     {}", id);
        }
    } else {
        println!("[!] 저장하지 않았습니다. 저장하려면 --yes를 지정하세요.");
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &RagConfig) -> Result<()> {
    println!("entity-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let data_dir = get_data_dir();
    println!("[*] 데이터 디렉토리: {}", data_dir.display());

    let config_path = data_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        println!("[OK] 설정 파일: {}", config_path.display());
    } else {
        println!("[*] 설정 파일: 없음 (기본값 사용)");
    }

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    let registry = WebSearchRegistry::from_env();
    if registry.get(&config.web.provider).is_some() {
        println!("[OK] 웹 검색: {}", config.web.provider);
    } else {
        println!(
            "[!] 웹 검색: '{}' 사용 불가 (등록됨: {})",
            config.web.provider,
            registry.names().join(", ")
        );
    }

    match open_vectors(config).await {
        Ok(vectors) => match vectors.count().await {
            Ok(count) => println!(
                "[OK] 벡터 인덱스 '{}': {} 청크",
                vectors.index_name(),
                count
            ),
            Err(e) => println!("[!] 벡터 통계 조회 실패: {}", e),
        },
        Err(e) => println!("[!] 벡터 저장소 열기 실패: {:#}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
