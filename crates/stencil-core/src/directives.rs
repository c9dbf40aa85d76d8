//! Built-in directive table.
//!
//! Every built-in receives its argument span exactly as written, outer
//! parentheses included (`"($user->isAdmin())"`), or `None` when the
//! directive had no parentheses. Expansions concatenate the span directly,
//! so `@if($x)` becomes `<?php if($x): ?>`.

use crate::balanced::strip_parens;
use crate::session::Session;

/// Variables hidden from views rendered through `@include` / `@extends`.
const SCOPE_WITHOUT_INTERNALS: &str =
    "array_except(get_defined_vars(), array('__data', '__path'))";

/// Authorization gate lookup used by `@can` / `@cannot`.
const GATE: &str = "app('Illuminate\\Contracts\\Auth\\Access\\Gate')";

const TRANSLATOR: &str = "app('translator')";

/// The built-in directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    // Conditionals
    If,
    ElseIf,
    Else,
    EndIf,
    Unless,
    EndUnless,
    HasSection,
    SectionMissing,
    Can,
    ElseCan,
    EndCan,
    Cannot,
    ElseCannot,
    EndCannot,

    // Loops
    For,
    EndFor,
    Foreach,
    EndForeach,
    Forelse,
    Empty,
    EndForelse,
    While,
    EndWhile,
    Break,
    Continue,

    // Raw code
    Php,
    EndPhp,
    Unset,

    // Composition
    Extends,
    Include,
    IncludeIf,
    Each,
    Yield,
    Show,
    Section,
    EndSection,
    Stop,
    Overwrite,
    Append,
    Push,
    EndPush,
    Stack,
    Inject,

    // Localization
    Lang,
    Choice,
}

impl Builtin {
    /// Look a directive up by name, ignoring ASCII case.
    pub fn lookup(name: &str) -> Option<Self> {
        let builtin = match name.to_ascii_lowercase().as_str() {
            "if" => Builtin::If,
            "elseif" => Builtin::ElseIf,
            "else" => Builtin::Else,
            "endif" => Builtin::EndIf,
            "unless" => Builtin::Unless,
            "endunless" => Builtin::EndUnless,
            "hassection" => Builtin::HasSection,
            "sectionmissing" => Builtin::SectionMissing,
            "can" => Builtin::Can,
            "elsecan" => Builtin::ElseCan,
            "endcan" => Builtin::EndCan,
            "cannot" => Builtin::Cannot,
            "elsecannot" => Builtin::ElseCannot,
            "endcannot" => Builtin::EndCannot,
            "for" => Builtin::For,
            "endfor" => Builtin::EndFor,
            "foreach" => Builtin::Foreach,
            "endforeach" => Builtin::EndForeach,
            "forelse" => Builtin::Forelse,
            "empty" => Builtin::Empty,
            "endforelse" => Builtin::EndForelse,
            "while" => Builtin::While,
            "endwhile" => Builtin::EndWhile,
            "break" => Builtin::Break,
            "continue" => Builtin::Continue,
            "php" => Builtin::Php,
            "endphp" => Builtin::EndPhp,
            "unset" => Builtin::Unset,
            "extends" => Builtin::Extends,
            "include" => Builtin::Include,
            "includeif" => Builtin::IncludeIf,
            "each" => Builtin::Each,
            "yield" => Builtin::Yield,
            "show" => Builtin::Show,
            "section" => Builtin::Section,
            "endsection" => Builtin::EndSection,
            "stop" => Builtin::Stop,
            "overwrite" => Builtin::Overwrite,
            "append" => Builtin::Append,
            "push" => Builtin::Push,
            "endpush" => Builtin::EndPush,
            "stack" => Builtin::Stack,
            "inject" => Builtin::Inject,
            "lang" => Builtin::Lang,
            "choice" => Builtin::Choice,
            _ => return None,
        };
        Some(builtin)
    }

    /// Expand the directive. `args` is the argument span with parentheses.
    pub fn compile(self, args: Option<&str>, session: &mut Session) -> String {
        let expr = args.unwrap_or("");
        match self {
            Builtin::If => format!("<?php if{}: ?>", expr),
            Builtin::ElseIf => format!("<?php elseif{}: ?>", expr),
            Builtin::Else => "<?php else: ?>".to_string(),
            Builtin::EndIf
            | Builtin::EndUnless
            | Builtin::EndCan
            | Builtin::EndCannot
            | Builtin::EndForelse => "<?php endif; ?>".to_string(),
            Builtin::Unless => format!("<?php if ( ! {}): ?>", expr),
            Builtin::HasSection => {
                format!("<?php if (! empty(trim($__env->yieldContent{}))): ?>", expr)
            }
            Builtin::SectionMissing => {
                format!("<?php if (empty(trim($__env->yieldContent{}))): ?>", expr)
            }
            Builtin::Can => format!("<?php if ({}->check{}): ?>", GATE, expr),
            Builtin::ElseCan => format!("<?php elseif ({}->check{}): ?>", GATE, expr),
            Builtin::Cannot => format!("<?php if ({}->denies{}): ?>", GATE, expr),
            Builtin::ElseCannot => format!("<?php elseif ({}->denies{}): ?>", GATE, expr),

            Builtin::For => format!("<?php for{}: ?>", expr),
            Builtin::EndFor => "<?php endfor; ?>".to_string(),
            Builtin::Foreach => format!("<?php foreach{}: ?>", expr),
            Builtin::EndForeach => "<?php endforeach; ?>".to_string(),
            Builtin::Forelse => {
                let flag = empty_flag(session.open_forelse());
                format!(
                    "<?php {0} = true; foreach{1}: {0} = false; ?>",
                    flag, expr
                )
            }
            Builtin::Empty => {
                let flag = empty_flag(session.close_forelse());
                format!("<?php endforeach; if ({}): ?>", flag)
            }
            Builtin::While => format!("<?php while{}: ?>", expr),
            Builtin::EndWhile => "<?php endwhile; ?>".to_string(),
            Builtin::Break => loop_control("break", args),
            Builtin::Continue => loop_control("continue", args),

            Builtin::Php => match args {
                Some(expr) => format!("<?php {}; ?>", expr),
                None => "<?php ".to_string(),
            },
            Builtin::EndPhp => " ?>".to_string(),
            Builtin::Unset => format!("<?php unset{}; ?>", expr),

            Builtin::Extends => {
                session.push_footer(render_view(strip_parens(expr)));
                String::new()
            }
            Builtin::Include => render_view(strip_parens(expr)),
            Builtin::IncludeIf => {
                let view = strip_parens(expr);
                format!(
                    "<?php if ($__env->exists({})) echo $__env->make({}, {})->render(); ?>",
                    view, view, SCOPE_WITHOUT_INTERNALS
                )
            }
            Builtin::Each => format!("<?php echo $__env->renderEach{}; ?>", expr),
            Builtin::Yield => format!("<?php echo $__env->yieldContent{}; ?>", expr),
            Builtin::Show => "<?php echo $__env->yieldSection(); ?>".to_string(),
            Builtin::Section => format!("<?php $__env->startSection{}; ?>", expr),
            Builtin::EndSection | Builtin::Stop => "<?php $__env->stopSection(); ?>".to_string(),
            Builtin::Overwrite => "<?php $__env->stopSection(true); ?>".to_string(),
            Builtin::Append => "<?php $__env->appendSection(); ?>".to_string(),
            Builtin::Push => format!("<?php $__env->startPush{}; ?>", expr),
            Builtin::EndPush => "<?php $__env->stopPush(); ?>".to_string(),
            Builtin::Stack => format!("<?php echo $__env->yieldPushContent{}; ?>", expr),
            Builtin::Inject => inject(expr),

            Builtin::Lang => format!("<?php echo {}->get{}; ?>", TRANSLATOR, expr),
            Builtin::Choice => format!("<?php echo {}->choice{}; ?>", TRANSLATOR, expr),
        }
    }
}

fn empty_flag(ordinal: usize) -> String {
    format!("$__empty_{}", ordinal)
}

fn render_view(view: &str) -> String {
    format!(
        "<?php echo $__env->make({}, {})->render(); ?>",
        view, SCOPE_WITHOUT_INTERNALS
    )
}

/// `@break`, `@break(2)` and `@break($done)` (likewise `@continue`).
fn loop_control(keyword: &str, args: Option<&str>) -> String {
    let Some(expr) = args.filter(|e| !e.is_empty()) else {
        return format!("<?php {}; ?>", keyword);
    };
    match loop_levels(strip_parens(expr).trim()) {
        Some(levels) => format!("<?php {} {}; ?>", keyword, levels.max(1)),
        None => format!("<?php if{} {}; ?>", expr, keyword),
    }
}

/// An integer literal: optional `-`, then digits only.
fn loop_levels(text: &str) -> Option<i64> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// `@inject('metrics', 'App\Services\Metrics')`.
fn inject(expr: &str) -> String {
    let cleaned: String = expr
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '"' | '\''))
        .collect();
    let mut segments = cleaned.splitn(2, ',');
    let variable = segments.next().unwrap_or("").trim();
    let service = segments.next().unwrap_or("").trim();
    format!("<?php ${} = app('{}'); ?>", variable, service)
}
