/// Implements the arithmetic operator traits for a single-field integer newtype by delegating to the inner value.
///
/// ```rust,ignore
/// op!(Points => binary Add::add, Sub::sub; inplace AddAssign::add_assign; unary Neg::neg);
/// ```
/// The operator traits must be in scope at the call site.
#[macro_export]
macro_rules! op {
    ($ty:ident => binary $($bin_trait:ident::$bin_fn:ident),* ; inplace $($in_trait:ident::$in_fn:ident),* ; unary $($un_trait:ident::$un_fn:ident),*) => {
        $(
            impl $bin_trait for $ty {
                type Output = $ty;

                fn $bin_fn(self, rhs: $ty) -> $ty {
                    $ty(self.0.$bin_fn(rhs.0))
                }
            }
        )*
        $(
            impl $in_trait for $ty {
                fn $in_fn(&mut self, rhs: $ty) {
                    self.0.$in_fn(rhs.0);
                }
            }
        )*
        $(
            impl $un_trait for $ty {
                type Output = $ty;

                fn $un_fn(self) -> $ty {
                    $ty(self.0.$un_fn())
                }
            }
        )*
    };
}
