//! Text Chunking Module
//!
//! 문단/헤더 경계를 존중하며 텍스트를 청크로 나눕니다.
//! 각 청크는 원문에서의 바이트 오프셋(`start..end`)을 함께 가집니다.

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 헤더에서 새 청크를 시작하기 위한 최소 크기 (바이트)
    pub min_characters: usize,
    /// 최대 청크 크기 (바이트, 오버랩 제외)
    pub max_characters: usize,
    /// 앞 청크와 겹치는 크기 (바이트)
    pub overlap_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            min_characters: 200,
            max_characters: 1200,
            overlap_characters: 100,
        }
    }
}

impl ChunkConfig {
    /// 오버랩 없는 설정
    pub fn without_overlap() -> Self {
        Self {
            overlap_characters: 0,
            ..Self::default()
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 원문 오프셋을 가진 청크
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// 0부터 시작하는 순번
    pub index: usize,
    pub text: String,
    /// 원문 시작 바이트 오프셋
    pub start: usize,
    /// 원문 끝 바이트 오프셋 (exclusive)
    pub end: usize,
}

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 순서대로 청크로 분할
    fn chunk(&self, text: &str) -> Vec<TextChunk>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// ParagraphChunker
// ============================================================================

/// 빈 줄로 구분된 블록 (코드 블록 내부의 빈 줄은 무시)
#[derive(Debug, Clone, Copy)]
struct Block {
    start: usize,
    end: usize,
    heading: bool,
}

/// 문단/헤더 인식 청커
///
/// - Markdown 헤더에서 섹션 분리
/// - 코드 블록 내부는 분리하지 않음
/// - 최대 크기를 넘는 문단은 공백 경계에서 분할
pub struct ParagraphChunker {
    config: ChunkConfig,
}

impl ParagraphChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// 원문을 블록으로 분할
    fn split_blocks(text: &str) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut current: Option<Block> = None;
        let mut in_code_block = false;
        let mut offset = 0;

        for line in text.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();

            let trimmed = line.trim();
            if trimmed.starts_with("```") {
                in_code_block = !in_code_block;
            }

            if trimmed.is_empty() && !in_code_block {
                blocks.extend(current.take());
                continue;
            }

            let heading = !in_code_block && is_heading(trimmed);
            if heading {
                blocks.extend(current.take());
            }

            let content_start = line_start + (line.len() - line.trim_start().len());
            let content_end = line_start + line.trim_end().len();

            match current.as_mut() {
                Some(block) => block.end = block.end.max(content_end),
                None => {
                    current = Some(Block {
                        start: content_start,
                        end: content_end,
                        heading,
                    })
                }
            }
        }

        blocks.extend(current);
        blocks
    }

    /// 최대 크기를 넘는 블록을 공백 경계에서 분할
    fn split_long_block(&self, text: &str, block: Block) -> Vec<Block> {
        let max = self.config.max_characters.max(1);
        let mut pieces = Vec::new();
        let mut start = block.start;

        while block.end - start > max {
            let mut limit = floor_char_boundary(text, start + max);
            if limit <= start {
                limit = ceil_char_boundary(text, start + 1);
            }

            let cut = text[start..limit]
                .rfind(char::is_whitespace)
                .filter(|&p| p > 0)
                .map(|p| start + p)
                .unwrap_or(limit);

            pieces.push(Block {
                start,
                end: cut,
                heading: block.heading && pieces.is_empty(),
            });

            let rest = &text[cut..block.end];
            start = cut + (rest.len() - rest.trim_start().len());
        }

        if start < block.end {
            pieces.push(Block {
                start,
                end: block.end,
                heading: block.heading && pieces.is_empty(),
            });
        }

        pieces
    }

    /// 블록을 최대 크기 안에서 합칩니다.
    fn group(&self, pieces: Vec<Block>) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut current: Option<(usize, usize)> = None;

        for piece in pieces {
            current = match current {
                None => Some((piece.start, piece.end)),
                Some((start, end)) => {
                    let too_big = piece.end - start > self.config.max_characters;
                    let section_break = piece.heading && end - start >= self.config.min_characters;

                    if too_big || section_break {
                        spans.push((start, end));
                        Some((piece.start, piece.end))
                    } else {
                        Some((start, piece.end))
                    }
                }
            };
        }

        spans.extend(current);
        spans
    }

    /// 앞 청크 끝부분을 단어 경계에서 당겨와 오버랩 적용
    fn overlap_start(&self, text: &str, prev_start: usize, start: usize) -> usize {
        if self.config.overlap_characters == 0 {
            return start;
        }

        let desired = start
            .saturating_sub(self.config.overlap_characters)
            .max(prev_start);
        let desired = floor_char_boundary(text, desired);

        let window = &text[desired..start];
        let Some(ws) = window.find(char::is_whitespace) else {
            return start;
        };

        let after_ws = &window[ws..];
        let word_start = desired + ws + (after_ws.len() - after_ws.trim_start().len());

        if word_start < start {
            word_start
        } else {
            start
        }
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, text: &str) -> Vec<TextChunk> {
        if text.trim().is_empty() {
            return vec![];
        }

        let pieces: Vec<Block> = Self::split_blocks(text)
            .into_iter()
            .flat_map(|b| self.split_long_block(text, b))
            .collect();

        let spans = self.group(pieces);

        spans
            .iter()
            .enumerate()
            .map(|(index, &(start, end))| {
                let start = if index == 0 {
                    start
                } else {
                    self.overlap_start(text, spans[index - 1].0, start)
                };

                TextChunk {
                    index,
                    text: text[start..end].to_string(),
                    start,
                    end,
                }
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "ParagraphChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Markdown 헤더 여부 (`#` 1~6개 + 공백)
fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(char::is_whitespace)
}

/// UTF-8 경계 조정 (인덱스 이하로)
#[inline]
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        s.len()
    } else {
        let mut i = index;
        while i > 0 && !s.is_char_boundary(i) {
            i -= 1;
        }
        i
    }
}

/// UTF-8 경계 조정 (인덱스 이상으로)
#[inline]
fn ceil_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(ParagraphChunker::with_defaults())
}

// ============================================================================
// Tests
// ============================================================================
