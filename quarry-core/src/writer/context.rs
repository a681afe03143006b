#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    #[default]
    None,
    Fetch,
    Entity,
    Filter,
    LinkEntity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub depth: usize,
    pub fragment: Fragment,
    /// Break lines and indent nested elements.
    pub pretty: bool,
}

impl Context {
    pub fn new(fragment: Fragment, pretty: bool) -> Self {
        Self {
            depth: 0,
            fragment,
            pretty,
        }
    }

    /// Context of an element nested in the current one.
    pub fn nested(&self, fragment: Fragment) -> Context {
        Context {
            depth: self.depth + 1,
            fragment,
            ..*self
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new(Fragment::None, false)
    }
}
