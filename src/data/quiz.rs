//! Multiple-choice quiz bank.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::QuizQuestion;

struct QuizEntry {
    question: &'static str,
    options: [&'static str; 4],
    correct: usize,
}

impl QuizEntry {
    fn to_question(&self) -> QuizQuestion {
        QuizQuestion {
            question: self.question.to_string(),
            options: self.options.iter().map(|o| o.to_string()).collect(),
            correct_answer_index: self.correct,
        }
    }
}

const BANK: &[QuizEntry] = &[
    QuizEntry {
        question: "What is the primary goal of diversification in an investment portfolio?",
        options: [
            "To maximize short-term gains",
            "To concentrate on a single industry",
            "To reduce risk by spreading investments",
            "To only invest in high-risk assets",
        ],
        correct: 2,
    },
    QuizEntry {
        question: "A 'bear market' is characterized by:",
        options: [
            "Rising stock prices and investor optimism",
            "Falling stock prices and investor pessimism",
            "Stable prices with low volatility",
            "A market with no animal-named stocks",
        ],
        correct: 1,
    },
    QuizEntry {
        question: "What does the P/E ratio of a stock measure?",
        options: [
            "Price to Earnings",
            "Profit to Equity",
            "Price to Equity",
            "Profit to Expense",
        ],
        correct: 0,
    },
    QuizEntry {
        question: "What is a 'blue-chip' stock?",
        options: [
            "A stock that costs less than $1",
            "A newly issued stock",
            "A stock from a large, reputable, and financially sound company",
            "A stock in the technology sector",
        ],
        correct: 2,
    },
    QuizEntry {
        question: "What is the main difference between a stock and a bond?",
        options: [
            "There is no difference",
            "Stocks represent ownership (equity), while bonds represent debt",
            "Stocks are only issued by governments",
            "Bonds always provide higher returns",
        ],
        correct: 1,
    },
    QuizEntry {
        question: "What does it mean to 'short' a stock?",
        options: [
            "Selling a stock you don't own, betting its price will fall",
            "Buying a stock for a short period",
            "Buying a small amount of a stock",
            "A stock that is not performing well",
        ],
        correct: 0,
    },
    QuizEntry {
        question: "A 'market order' is an instruction to:",
        options: [
            "Buy or sell a stock at a specific price or better",
            "Buy or sell a stock immediately at the current best available price",
            "Cancel a previous order",
            "Buy or sell only after the market closes",
        ],
        correct: 1,
    },
    QuizEntry {
        question: "What is dollar-cost averaging?",
        options: [
            "Investing a fixed amount of money at regular intervals, regardless of the price",
            "Trying to time the market to buy low and sell high",
            "Only investing in US dollars",
            "Averaging the cost of all your assets",
        ],
        correct: 0,
    },
    QuizEntry {
        question: "What is an Exchange-Traded Fund (ETF)?",
        options: [
            "A single high-performing tech stock",
            "A type of cryptocurrency",
            "A fund that tracks an index (like the S&P 500) and can be traded like a stock",
            "A government savings bond",
        ],
        correct: 2,
    },
    QuizEntry {
        question: "What is 'liquidity' in financial markets?",
        options: [
            "The total cash a company has",
            "The ease with which an asset can be converted into cash without affecting its market price",
            "The amount of water a company sells",
            "A measure of a company's debt",
        ],
        correct: 1,
    },
    QuizEntry {
        question: "A 'bull market' is characterized by:",
        options: [
            "Rising stock prices and investor optimism",
            "Falling stock prices and investor pessimism",
            "A market that is closed for holidays",
            "A market dominated by agricultural stocks",
        ],
        correct: 0,
    },
    QuizEntry {
        question: "What is a 'dividend'?",
        options: [
            "A loan from the company to shareholders",
            "A tax paid by investors",
            "A distribution of a portion of a company's earnings to its shareholders",
            "The initial price of a stock",
        ],
        correct: 2,
    },
    QuizEntry {
        question: "What does ROI stand for?",
        options: [
            "Rate of Inflation",
            "Return on Investment",
            "Risk of Insolvency",
            "Realized Official Income",
        ],
        correct: 1,
    },
    QuizEntry {
        question: "What is a 'capital gain'?",
        options: [
            "The total amount of capital a company has",
            "A tax on investment profits",
            "Profit from the sale of an asset, like a stock",
            "The main headquarters of a company",
        ],
        correct: 2,
    },
    QuizEntry {
        question: "Which of the following is considered the riskiest investment?",
        options: [
            "Government Bonds",
            "Blue-Chip Stocks",
            "Savings Account",
            "Cryptocurrency",
        ],
        correct: 3,
    },
    QuizEntry {
        question: "What is 'inflation'?",
        options: [
            "The rate at which the general level of prices for goods and services is rising",
            "A period of falling prices",
            "A type of investment strategy",
            "The process of a company going public",
        ],
        correct: 0,
    },
    QuizEntry {
        question: "A 'limit order' is an instruction to:",
        options: [
            "Buy or sell a stock only up to a certain limit of shares",
            "Buy or sell a stock immediately at any price",
            "Buy or sell a stock at a specific price or better",
            "Limit your losses on a trade",
        ],
        correct: 2,
    },
    QuizEntry {
        question: "What is a mutual fund?",
        options: [
            "A fund that invests in a single company",
            "A fund owned by two people",
            "A professionally managed investment fund that pools money from many investors to purchase securities",
            "A type of checking account",
        ],
        correct: 2,
    },
    QuizEntry {
        question: "What does it mean if a stock is 'volatile'?",
        options: [
            "It is very stable and predictable",
            "It is likely to go bankrupt",
            "Its price fluctuates rapidly and unpredictably",
            "It is a foreign stock",
        ],
        correct: 2,
    },
    QuizEntry {
        question: "What is a 401(k)?",
        options: [
            "A type of high-risk investment",
            "A government tax on investments",
            "An employer-sponsored retirement savings plan in the US",
            "A stock market index",
        ],
        correct: 2,
    },
    QuizEntry {
        question: "What is a 'stop-loss' order designed to do?",
        options: [
            "Maximize profits on a trade",
            "Limit potential losses on a security position",
            "Buy a stock at a lower-than-market price",
            "Execute a trade only at the end of the day",
        ],
        correct: 1,
    },
    QuizEntry {
        question: "A trading algorithm based on a 'moving average crossover' often generates a buy signal when:",
        options: [
            "The stock price hits an all-time low",
            "A short-term moving average crosses above a long-term moving average",
            "Market volatility is extremely high",
            "The company announces poor earnings",
        ],
        correct: 1,
    },
    QuizEntry {
        question: "Analyzing discussions in Discord or Telegram to gauge market mood is a form of:",
        options: [
            "Technical Analysis",
            "Fundamental Analysis",
            "Sentiment Analysis",
            "Quantitative Analysis",
        ],
        correct: 2,
    },
];

/// Number of questions in the bank.
pub fn len() -> usize {
    BANK.len()
}

/// A random question from the bank.
pub fn random_question<R: Rng + ?Sized>(rng: &mut R) -> QuizQuestion {
    BANK.choose(rng).unwrap_or(&BANK[0]).to_question()
}
