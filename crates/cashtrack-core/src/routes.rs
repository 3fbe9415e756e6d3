//! Client-facing views and the rule that guards them.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Main,
    AddExpense,
    Statistics,
    Categories,
}

impl Route {
    /// Map a path to a view. Unknown paths land on the main list.
    pub fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "/login" => Route::Login,
            "/add" => Route::AddExpense,
            "/statistics" => Route::Statistics,
            "/categories" => Route::Categories,
            _ => Route::Main,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Main => "/",
            Route::AddExpense => "/add",
            Route::Statistics => "/statistics",
            Route::Categories => "/categories",
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Login)
    }

    /// The view actually shown: protected views redirect to login without a session.
    pub fn resolve(self, authenticated: bool) -> Self {
        if self.is_protected() && !authenticated {
            Route::Login
        } else {
            self
        }
    }
}
