/// 有上限的输出缓冲
///
/// 超过上限后丢弃后续内容，并在末尾追加一次截断提示。
#[derive(Debug)]
pub struct OutputBuffer {
    data: String,
    limit: usize,
    truncated: bool,
}

const TRUNCATED_NOTICE: &str = "... [output truncated]";

impl OutputBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            data: String::new(),
            limit,
            truncated: false,
        }
    }

    pub fn push_line(&mut self, line: &str) {
        if self.truncated {
            return;
        }

        let needed = line.len() + usize::from(!self.data.is_empty());
        if self.data.len() + needed > self.limit {
            self.truncated = true;
            if !self.data.is_empty() {
                self.data.push('\n');
            }
            self.data.push_str(TRUNCATED_NOTICE);
            return;
        }

        if !self.data.is_empty() {
            self.data.push('\n');
        }
        self.data.push_str(line);
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn into_string(self) -> String {
        self.data
    }
}

/// 把字节流切分成行，单行超过上限时截断并丢弃到下一个换行为止
///
/// 缓存的未完成行不超过 `max_line` 字节，没有换行的超长输出也不会无限增长。
#[derive(Debug)]
pub struct LineSplitter {
    pending: Vec<u8>,
    max_line: usize,
    overflowed: bool,
}

impl LineSplitter {
    pub fn new(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line: max_line.max(1),
            overflowed: false,
        }
    }

    /// 追加一段输出，返回其中已经完整的行
    pub fn push(&mut self, mut chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        while !chunk.is_empty() {
            let (head, rest, complete) = match chunk.iter().position(|b| *b == b'\n') {
                Some(pos) => (&chunk[..pos], &chunk[pos + 1..], true),
                None => (chunk, &chunk[chunk.len()..], false),
            };

            if !self.overflowed {
                let room = self.max_line - self.pending.len();
                if head.len() > room {
                    self.pending.extend_from_slice(&head[..room]);
                    self.overflowed = true;
                    lines.push(self.take_line());
                } else {
                    self.pending.extend_from_slice(head);
                }
            }

            if complete {
                if self.overflowed {
                    self.overflowed = false;
                } else {
                    lines.push(self.take_line());
                }
            }
            chunk = rest;
        }
        lines
    }

    /// 输出结束，返回最后一个没有换行的行
    pub fn finish(mut self) -> Option<String> {
        (!self.pending.is_empty()).then(|| self.take_line())
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending)
            .trim_end_matches('\r')
            .to_string();
        self.pending.clear();
        line
    }
}
