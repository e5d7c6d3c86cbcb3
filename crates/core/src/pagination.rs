use std::num::NonZeroUsize;

use console_domain::Job;

/// 按固定大小切分，保持原有顺序，最后一页可以不满
pub fn group(jobs: &[Job], page_size: NonZeroUsize) -> Vec<Vec<Job>> {
    jobs.chunks(page_size.get()).map(<[Job]>::to_vec).collect()
}

/// 越界时返回空页
pub fn page(pages: &[Vec<Job>], index: usize) -> &[Job] {
    pages.get(index).map(Vec::as_slice).unwrap_or(&[])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    First,
    Prev,
    Next,
    Last,
    Goto(usize),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub index: usize,
    pub count: usize,
    pub total_items: usize,
}

impl PageInfo {
    /// 从1开始的页码，用于展示
    pub fn display_number(&self) -> usize {
        if self.count == 0 {
            0
        } else {
            self.index + 1
        }
    }
}

/// 分页状态：页面列表加当前页下标
///
/// 下标始终落在 `[0, page_count - 1]`，没有页面时为 0。
/// 导航到边界之外是空操作，返回值表示下标是否改变。
#[derive(Debug, Clone)]
pub struct Paginator {
    pages: Vec<Vec<Job>>,
    index: usize,
    page_size: NonZeroUsize,
    total_items: usize,
}

impl Paginator {
    pub fn new(page_size: NonZeroUsize) -> Self {
        Self {
            pages: Vec::new(),
            index: 0,
            page_size,
            total_items: 0,
        }
    }

    pub fn from_jobs(jobs: &[Job], page_size: NonZeroUsize) -> Self {
        let mut paginator = Self::new(page_size);
        paginator.replace_jobs(jobs);
        paginator
    }

    /// 全量重新分页，当前页在新页数内时保持不变
    pub fn replace_jobs(&mut self, jobs: &[Job]) {
        self.replace(group(jobs, self.page_size));
    }

    pub fn replace(&mut self, pages: Vec<Vec<Job>>) {
        self.total_items = pages.iter().map(Vec::len).sum();
        self.pages = pages;
        self.index = self.index.min(self.last_index());
    }

    pub fn first(&mut self) -> bool {
        self.goto(0)
    }

    pub fn prev(&mut self) -> bool {
        match self.index.checked_sub(1) {
            Some(index) => self.goto(index),
            None => false,
        }
    }

    pub fn next(&mut self) -> bool {
        self.goto(self.index.saturating_add(1))
    }

    pub fn last(&mut self) -> bool {
        self.goto(self.last_index())
    }

    pub fn goto(&mut self, index: usize) -> bool {
        let target = index.min(self.last_index());
        let changed = target != self.index;
        self.index = target;
        changed
    }

    pub fn apply(&mut self, nav: PageNav) -> bool {
        match nav {
            PageNav::First => self.first(),
            PageNav::Prev => self.prev(),
            PageNav::Next => self.next(),
            PageNav::Last => self.last(),
            PageNav::Goto(index) => self.goto(index),
        }
    }

    pub fn current(&self) -> &[Job] {
        page(&self.pages, self.index)
    }

    pub fn pages(&self) -> &[Vec<Job>] {
        &self.pages
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn info(&self) -> PageInfo {
        PageInfo {
            index: self.index,
            count: self.pages.len(),
            total_items: self.total_items,
        }
    }

    fn last_index(&self) -> usize {
        self.pages.len().saturating_sub(1)
    }
}
